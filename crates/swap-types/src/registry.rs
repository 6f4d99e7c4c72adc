//! Registry trait for self-registering implementations.
//!
//! Pluggable back ends (pricing sources, account signers, storage) expose a
//! `Registry` type naming the key used under `implementations.<name>` in the
//! configuration file together with the factory that builds them.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// e.g. "zeroex" for `[pricing.implementations.zeroex]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
