//! # Terraform Plan
//!
//! Decoding of plan artifacts into an immutable [`Plan`] value.
//!
//! Plans are read in Terraform's machine-readable JSON representation
//! (`terraform show -json <planfile>`). Decoding is pure: the same bytes always yield the same
//! [`Plan`], and anything that does not look like a complete plan (empty, truncated, a raw
//! binary plan archive, an unknown `format_version`) is a [`MalformedPlanError`].
//!
//! ## Example
//!
//! ```
//! use terraform_plan::{decode_plan, Action};
//!
//! let bytes = br#"{
//!   "format_version": "1.2",
//!   "resource_changes": [{
//!     "address": "aws_s3_bucket.logs",
//!     "mode": "managed",
//!     "type": "aws_s3_bucket",
//!     "name": "logs",
//!     "change": { "actions": ["create"], "before": null, "after": { "bucket": "logs" } }
//!   }]
//! }"#;
//!
//! let plan = decode_plan(bytes).unwrap();
//! assert_eq!(plan.resource_changes[0].action, Action::Create);
//! ```

mod decode;
mod error;
mod types;

pub use decode::{decode_plan, encode_plan, SUPPORTED_FORMAT_MAJOR};
pub use error::MalformedPlanError;
pub use types::{Action, OutputChange, Plan, PlanSummary, ResourceChange, ResourceMode};
