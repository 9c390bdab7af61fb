//! Built-in resource types
//!
//! One module per resource type. Each declares its typed id, arguments,
//! state and the [`Resource`](super::schema::Resource) impl that maps them
//! to and from the ARM REST representation.

pub mod batch_account;
pub mod batch_pool;
pub mod resource_group;
pub mod storage_account;
pub mod subnet;
pub mod virtual_network;

use std::collections::BTreeMap;

pub type Tags = BTreeMap<String, String>;

pub(crate) fn default_true() -> bool {
    true
}
