//! Gate check implementations, one per gate kind.

pub mod approval;
pub mod smoke;
pub mod syntax;
pub mod test_suite;

pub use approval::ManualApprovalCheck;
pub use smoke::SmokeTestCheck;
pub use syntax::SyntaxCheck;
pub use test_suite::TestSuiteCheck;
