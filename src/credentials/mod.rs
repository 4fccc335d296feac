//! Compute gateway key management.

pub mod gateway_key;


pub use gateway_key::{
    GatewayKeyRefresher, KeyDecoder, PlainKeyDecoder, ACTIVE_KEY_SETTING, PRIMARY_KEY_SETTING,
    SECONDARY_KEY_SETTING, USE_SECONDARY_KEY_SETTING,
};
