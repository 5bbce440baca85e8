//! Utilities for launching an EPICS soft IOC on demand in tests and
//! benchmarks, with generated database text and scoped cleanup.
//!
//! Typical usage:
//! ```no_run
//! use softioc_harness::{
//!     build_database, DatabaseSpec, IocConfig, RecordSpec, SoftIoc, Stopwatch,
//! };
//!
//! let db = DatabaseSpec::default()
//!     .with_record(
//!         RecordSpec::new("$(P):bo", "bo")
//!             .with_field("ZNAM", "OUT")
//!             .with_field("ONAM", "IN"),
//!     )
//!     .with_record(
//!         RecordSpec::new("$(P):ao", "ao")
//!             .with_field("DRVH", 5)
//!             .with_field("DRVL", 1),
//!     );
//!
//! let config = IocConfig::new().with_db_text(build_database(&db));
//! let (ioc, timing) = Stopwatch::time(|| SoftIoc::spawn(config));
//! let ioc = ioc.expect("IOC should launch");
//! println!("startup took {:.3}s, pid {}", timing.elapsed_secs(), ioc.pid());
//! // ...exercise the IOC through a Channel Access client...
//! drop(ioc); // kills and reaps the process, then removes its files
//! ```
//!
//! The IOC itself is treated as a black box: this crate hands it database and
//! access security text through temporary files and pipes its stdin/stdout,
//! but speaks none of its protocols.

mod db;
mod dbd;
mod error;
mod session;
mod stopwatch;

pub use db::{build_database, DatabaseSpec, RecordSpec};
pub use dbd::{find_dbd_path, EPICS_BASE_ENV};
pub use error::{HarnessError, HarnessResult};
pub use session::{IocConfig, SoftIoc, DEFAULT_ACCESS_RULES};
pub use stopwatch::{Stopwatch, TimingResult};
