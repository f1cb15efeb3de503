//! Domain entities for Padlink.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain**.  Domain code:
//!
//! - Contains the core business rules of the application.
//! - Has **no** imports from OS APIs, serial drivers, network libraries, or
//!   async runtimes.
//! - Can be compiled and tested on any platform without any hardware attached.
//!
//! Here the business rules are: which serial devices count as controllers,
//! which player number each controller holds, and how numbers are reused.

/// Serial device identity and the "is this a controller?" predicate.
pub mod device;

/// Player → device bindings.
///
/// See [`registry::PlayerRegistry`] for the main type.
pub mod registry;

/// Player numbers and the lowest-free allocation policy.
pub mod slot;
