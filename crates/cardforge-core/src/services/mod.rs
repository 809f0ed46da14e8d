//! Services shared by cardforge clients.

mod library;

pub use library::LibraryService;
