//! Receipt resolution.
//!
//! The receipt of a submitted message is the root of a cascade: every child
//! message it spawned, on whatever shard, hangs below it with its own
//! receipt. The execution of interest is the first receipt in pre-order whose
//! contract address is the called contract; children are visited in the order
//! the ledger reports them.

use crate::handlers::submission::LastCall;
use blockgen_gateway::{GatewayError, GatewayService};
use blockgen_types::{truncate_id, Address, MessageHash, ReceiptNode, ResolvedLocation};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur while resolving a receipt.
#[derive(Debug, Error)]
pub enum ResolveError {
	#[error("Message hash is empty")]
	EmptyHandle,
	#[error("Receipt for the execution of {contract} is not found in the cascade of {message}")]
	ReceiptNotFound {
		message: MessageHash,
		contract: Address,
	},
	#[error("Failed to fetch receipt: {0}")]
	Gateway(#[from] GatewayError),
}

/// Returns the first receipt in pre-order whose contract address is `target`.
///
/// Iterative, so arbitrarily deep cascades cannot overflow the stack.
pub fn find_execution_receipt<'a>(root: &'a ReceiptNode, target: &Address) -> Option<&'a ReceiptNode> {
	let mut stack = vec![root];
	while let Some(node) = stack.pop() {
		if &node.contract_address == target {
			return Some(node);
		}
		// Reversed so the first child is popped first
		stack.extend(node.output_receipts.iter().rev());
	}
	None
}

/// Locates the block holding the execution of the last submitted call.
pub struct ReceiptResolver {
	gateway: Arc<GatewayService>,
}

impl ReceiptResolver {
	pub fn new(gateway: Arc<GatewayService>) -> Self {
		Self { gateway }
	}

	/// Resolves the shard and block of the last call's execution.
	pub async fn resolve(&self, last: Option<&LastCall>) -> Result<ResolvedLocation, ResolveError> {
		let last = last.ok_or(ResolveError::EmptyHandle)?;
		self.resolve_message(&last.message, &last.address).await
	}

	#[instrument(skip_all, fields(message = %truncate_id(&message.0), contract = %target))]
	pub async fn resolve_message(
		&self,
		message: &MessageHash,
		target: &Address,
	) -> Result<ResolvedLocation, ResolveError> {
		let root = self.gateway.receipt(message).await?;

		let receipt =
			find_execution_receipt(&root, target).ok_or_else(|| ResolveError::ReceiptNotFound {
				message: message.clone(),
				contract: target.clone(),
			})?;

		let location = receipt.location();
		tracing::info!(
			shard_id = %location.shard_id,
			block_hash = %truncate_id(&location.block_hash.0),
			"Resolved execution receipt"
		);
		Ok(location)
	}
}
