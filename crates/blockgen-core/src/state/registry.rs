//! Contract registry.
//!
//! In-memory table of the contracts of one run, in configuration order.
//! Every entry moves through Registered -> Compiled -> Deployed; Deployed is
//! terminal and is reached exactly once.

use blockgen_artifacts::CompiledArtifact;
use blockgen_types::{Address, ContractId, ContractSpec};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while looking up or updating contracts.
#[derive(Debug, Error)]
pub enum RegistryError {
	#[error("Duplicated contract id: {0}")]
	DuplicateContractId(ContractId),
	#[error("Contract id {0} is not defined")]
	UnknownContract(ContractId),
	#[error("Contract id {0} is not deployed")]
	ContractNotDeployed(ContractId),
	#[error("Contract id {0} is already deployed")]
	AlreadyDeployed(ContractId),
	#[error("Invalid state transition for contract {id} from {from} to {to}")]
	InvalidTransition {
		id: ContractId,
		from: DeploymentState,
		to: DeploymentState,
	},
}

/// Lifecycle of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeploymentState {
	/// Known from configuration, nothing compiled yet.
	Registered,
	/// Artifacts are available, not yet on the ledger.
	Compiled,
	/// Deployed; the address is known.
	Deployed,
}

impl fmt::Display for DeploymentState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Registered => f.write_str("registered"),
			Self::Compiled => f.write_str("compiled"),
			Self::Deployed => f.write_str("deployed"),
		}
	}
}

// Static transition table - each state maps to allowed next states
static TRANSITIONS: Lazy<HashMap<DeploymentState, HashSet<DeploymentState>>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(
		DeploymentState::Registered,
		HashSet::from([DeploymentState::Compiled]),
	);
	m.insert(
		DeploymentState::Compiled,
		HashSet::from([DeploymentState::Deployed]),
	);
	m.insert(DeploymentState::Deployed, HashSet::new());
	m
});

/// One contract of the run.
#[derive(Debug, Clone)]
pub struct ContractEntry {
	pub spec: ContractSpec,
	pub artifact: Option<CompiledArtifact>,
	pub state: DeploymentState,
	pub address: Option<Address>,
}

impl ContractEntry {
	fn new(spec: ContractSpec) -> Self {
		Self {
			spec,
			artifact: None,
			state: DeploymentState::Registered,
			address: None,
		}
	}

	pub fn is_deployed(&self) -> bool {
		self.state == DeploymentState::Deployed
	}
}

/// Contracts of one run, iterated in registration order.
#[derive(Debug, Default)]
pub struct ContractRegistry {
	entries: Vec<ContractEntry>,
	index: HashMap<ContractId, usize>,
}

impl ContractRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a registry from configuration, rejecting duplicate ids.
	pub fn from_specs(specs: impl IntoIterator<Item = ContractSpec>) -> Result<Self, RegistryError> {
		let mut registry = Self::new();
		for spec in specs {
			registry.register(spec)?;
		}
		Ok(registry)
	}

	pub fn register(&mut self, spec: ContractSpec) -> Result<(), RegistryError> {
		if self.index.contains_key(&spec.id) {
			return Err(RegistryError::DuplicateContractId(spec.id));
		}
		self.index.insert(spec.id, self.entries.len());
		self.entries.push(ContractEntry::new(spec));
		Ok(())
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn contains(&self, id: ContractId) -> bool {
		self.index.contains_key(&id)
	}

	pub fn get(&self, id: ContractId) -> Result<&ContractEntry, RegistryError> {
		self.index
			.get(&id)
			.map(|&i| &self.entries[i])
			.ok_or(RegistryError::UnknownContract(id))
	}

	fn get_mut(&mut self, id: ContractId) -> Result<&mut ContractEntry, RegistryError> {
		match self.index.get(&id) {
			Some(&i) => Ok(&mut self.entries[i]),
			None => Err(RegistryError::UnknownContract(id)),
		}
	}

	/// Ids of every entry not yet deployed, in registration order.
	pub fn pending(&self) -> Vec<ContractId> {
		self.entries
			.iter()
			.filter(|entry| !entry.is_deployed())
			.map(|entry| entry.spec.id)
			.collect()
	}

	/// Address and artifact of a deployed contract.
	pub fn deployed(&self, id: ContractId) -> Result<(&Address, &CompiledArtifact), RegistryError> {
		let entry = self.get(id)?;
		match (&entry.state, &entry.address, &entry.artifact) {
			(DeploymentState::Deployed, Some(address), Some(artifact)) => Ok((address, artifact)),
			_ => Err(RegistryError::ContractNotDeployed(id)),
		}
	}

	/// Stores the compiled artifact of an entry.
	pub fn mark_compiled(
		&mut self,
		id: ContractId,
		artifact: CompiledArtifact,
	) -> Result<(), RegistryError> {
		let entry = self.get_mut(id)?;
		transition(entry, DeploymentState::Compiled)?;
		entry.artifact = Some(artifact);
		Ok(())
	}

	/// Records the address of a freshly deployed entry.
	pub fn mark_deployed(&mut self, id: ContractId, address: Address) -> Result<(), RegistryError> {
		let entry = self.get_mut(id)?;
		transition(entry, DeploymentState::Deployed)?;
		entry.address = Some(address);
		Ok(())
	}
}

fn transition(entry: &mut ContractEntry, to: DeploymentState) -> Result<(), RegistryError> {
	let from = entry.state;
	let allowed = TRANSITIONS
		.get(&from)
		.is_some_and(|next| next.contains(&to));

	if !allowed {
		if from == DeploymentState::Deployed {
			return Err(RegistryError::AlreadyDeployed(entry.spec.id));
		}
		return Err(RegistryError::InvalidTransition {
			id: entry.spec.id,
			from,
			to,
		});
	}

	entry.state = to;
	Ok(())
}
