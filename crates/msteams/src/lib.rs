//! Microsoft Teams / Bot Framework plumbing.
//!
//! Inbound activity parsing, the resumable conversation reference, and a
//! connector client for the v3 REST API authenticated with OAuth
//! client-credentials.

pub mod activity;
pub mod auth;
pub mod connector;
pub mod error;
pub mod reference;
pub mod types;

pub use {
    activity::TeamsActivity,
    connector::{Connector, ConnectorClient},
    error::{Error, Result},
    reference::ConversationReference,
    types::{
        ChannelAccount, ConversationAccount, ConversationParameters,
        ConversationResourceResponse, OutgoingActivity, ResourceResponse, TeamsChannelAccount,
    },
};
