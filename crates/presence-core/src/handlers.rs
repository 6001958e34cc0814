//! Built-in handlers, one per message kind.
//!
//! Only the status handler replies today. Discovery, get and set are logged so
//! the traffic is visible; their reply contracts are:
//! - discovery: answer point-to-point on `/device/<source>`, never broadcast
//! - get: answer with a `set` carrying the requested data type's value
//! - set: apply the value, then answer with a `set/response/ack`

use crate::dispatch::{Context, Handler, Outbound};
use crate::protocol::{topics, DataType, Message};
use tracing::debug;

/// Acknowledges peer heartbeats and recognises our own.
///
/// | data_type     | device_name       | action                          |
/// |---------------|-------------------|---------------------------------|
/// | client/server | a peer            | ack to `/device/<device_name>`  |
/// | client/server | empty             | none                            |
/// | server        | us                | none ("Self status verified")   |
/// | other         | -                 | none                            |
pub struct StatusHandler;

impl Handler for StatusHandler {
    fn handle(
        &self,
        ctx: &Context<'_>,
        data_type: &DataType,
        id: u32,
        msg: &Message,
    ) -> Option<Outbound> {
        let report = msg.status_report()?;
        let is_self = ctx.identity.is_self(&report.device_name);

        match (data_type, is_self) {
            (DataType::Client | DataType::Server, false) if report.device_name.is_empty() => {
                debug!("Status from unnamed device (id {}), not acknowledged", id);
                None
            }
            (DataType::Client | DataType::Server, false) => {
                debug!(
                    "Acknowledging {} status from {} (id {})",
                    data_type, report.device_name, id
                );
                Some(Outbound {
                    topic: topics::device_topic(&report.device_name),
                    message: Message::ack(id),
                })
            }
            (DataType::Server, true) => {
                debug!("Self status verified");
                None
            }
            _ => {
                debug!("STAT({})({})({:?})", data_type, id, msg);
                None
            }
        }
    }
}

pub struct DiscoveryHandler;

impl Handler for DiscoveryHandler {
    fn handle(&self, _: &Context<'_>, data_type: &DataType, id: u32, msg: &Message) -> Option<Outbound> {
        debug!("DISCO({})({})({:?})", data_type, id, msg);
        None
    }
}

pub struct GetHandler;

impl Handler for GetHandler {
    fn handle(&self, _: &Context<'_>, data_type: &DataType, id: u32, msg: &Message) -> Option<Outbound> {
        debug!("GET({})({})({:?})", data_type, id, msg);
        None
    }
}

pub struct SetHandler;

impl Handler for SetHandler {
    fn handle(&self, _: &Context<'_>, data_type: &DataType, id: u32, msg: &Message) -> Option<Outbound> {
        debug!("SET({})({})({:?})", data_type, id, msg);
        None
    }
}
