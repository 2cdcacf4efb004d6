//! Physical topology discovery: presence signalling, per-side handshakes and
//! address allocation.

pub mod handshake;
pub mod scanner;
pub mod states;
pub mod timer;

pub use handshake::configure_module;
pub use scanner::{ScanOutcome, Scanner};
pub use states::ScanState;
pub use timer::CountdownTimer;
