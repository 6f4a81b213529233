pub mod audit;
pub mod context;
pub mod db;
pub mod heartbeat;
pub mod jwt;
pub mod quota;
pub mod redact;
pub mod usage;
pub mod vendor;

pub use audit::AuditService;
pub use context::AuthContext;
pub use db::Database;
pub use jwt::{Claims, JwtService};
pub use quota::QuotaEngine;
pub use usage::UsageMeter;
pub use vendor::VendorClient;
