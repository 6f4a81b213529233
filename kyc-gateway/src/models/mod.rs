//! Data model (spec §3): every entity the core persists.

pub mod api_key;
pub mod asset;
pub mod audit_log;
pub mod kyc_request;
pub mod misc;
pub mod oauth_client;
pub mod organization;
pub mod quota;
pub mod role;
pub mod usage;
pub mod user;

pub use api_key::{deserialize_scopes, parse_scopes, ApiKey, ApiKeyCreated, ApiKeyStatus};
pub use asset::{FaceImageRef, ImageAsset, VideoAsset};
pub use audit_log::{ApiRequestLog, AuditLog};
pub use kyc_request::{KycRequest, KycRequestSnapshot, KycRequestStatus, KycRequestType};
pub use misc::{Invitation, InvitationStatus, Notification, PasswordReset, RecordStatus};
pub use oauth_client::{OAuthClient, OAuthClientCreated, OAuthClientStatus};
pub use organization::{MemberStatus, Organization, OrganizationMember, OrganizationStatus, Plan};
pub use quota::{start_of_next_month, OrganizationQuota, ServiceType};
pub use role::{OrgRole, Permission};
pub use usage::{bucket_day, UsageDailyBucket, UsageEvent, UsageLog};
pub use user::{User, UserProfile, UserStatus};
