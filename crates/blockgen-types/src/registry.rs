//! Registry trait for self-registering implementations.
//!
//! Gateway implementations declare the name they are configured
//! under together with the factory function that builds them.

/// Base trait for implementation registries.
///
/// Each implementation module provides a Registry struct that implements this
/// trait, for example:
/// - "cli" for gateway.implementations.cli
/// - "rpc" for gateway.implementations.rpc
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
