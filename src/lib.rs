pub mod auth;
pub mod config;
pub mod decimal;
pub mod desk;
pub mod directory;
pub mod engine;
pub mod errors;
pub mod guarantor;
pub mod loan;
pub mod notifications;
pub mod patch;
pub mod period;
pub mod repository;
pub mod types;
pub mod views;

// re-export key types
pub use config::LendingConfig;
pub use decimal::{Money, Rate};
pub use desk::LoanDesk;
pub use directory::{
    Affordability, DeductionCapacity, Member, MemberDirectory, OracleError, SalaryCapacityOracle,
    StaticDirectory,
};
pub use engine::{derive_status, LimitBreach, LimitCheck, Transition, Trigger};
pub use errors::{ErrorKind, FailureResponse, LendingError, Result};
pub use guarantor::{GuarantorRequest, GuarantorTally};
pub use loan::LoanRequest;
pub use notifications::{
    DispatchError, DispatchReport, MemoryDispatcher, Notification, NotificationDispatcher, Outbox,
    RejectionReason,
};
pub use patch::{LoanPatch, PeriodLimitPatch};
pub use period::{PeriodLimit, PeriodUsage};
pub use repository::{
    GuarantorRepository, Ledger, LoanRepository, MemoryLedger, MemoryStore, PeriodLimitRepository,
    Store,
};
pub use types::{
    ActorContext, GuarantorDecision, GuarantorRequestId, GuarantorStatus, LoanId, LoanStatus,
    MemberId, PeriodId, Role,
};
pub use views::LoanView;

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
