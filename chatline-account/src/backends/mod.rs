// ABOUTME: Account backend implementations.
// ABOUTME: Each backend implements the AccountService trait.

pub mod memory;
