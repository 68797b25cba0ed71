//! Pure translation of rumqttc events into [`LinkEvent`]s

use crate::error::ConnackCode;
use crate::transport::LinkEvent;
use rumqttc::{Event, Outgoing, Packet};
use tracing::trace;

/// Routing decisions for rumqttc events
pub struct MessageHandler;

impl MessageHandler {
    /// Map a rumqttc event to the event the assistant dispatches, if any
    pub fn route_mqtt_event(event: &Event) -> Option<LinkEvent> {
        match event {
            Event::Incoming(packet) => Self::route_incoming(packet),
            Event::Outgoing(outgoing) => Self::route_outgoing(outgoing),
        }
    }

    fn route_incoming(packet: &Packet) -> Option<LinkEvent> {
        match packet {
            Packet::ConnAck(ack) => Some(LinkEvent::ConnAck {
                code: ConnackCode::from(ack.code).as_u8(),
                session_present: ack.session_present,
            }),
            Packet::Publish(publish) => Some(LinkEvent::Message {
                topic: publish.topic.clone(),
                payload: publish.payload.clone(),
                qos: publish.qos.into(),
                retain: publish.retain,
            }),
            // QoS 1 and QoS 2 flows complete on PUBACK and PUBCOMP respectively
            Packet::PubAck(ack) => Some(LinkEvent::Published { pkid: ack.pkid }),
            Packet::PubComp(comp) => Some(LinkEvent::Published { pkid: comp.pkid }),
            Packet::Disconnect => Some(LinkEvent::Disconnected {
                reason: "broker closed the session".to_string(),
            }),
            other => {
                trace!("Ignoring incoming packet: {:?}", other);
                None
            }
        }
    }

    fn route_outgoing(outgoing: &Outgoing) -> Option<LinkEvent> {
        match outgoing {
            // Packet id 0 means QoS 0: the message has left the client
            Outgoing::Publish(0) => Some(LinkEvent::Published { pkid: 0 }),
            Outgoing::Disconnect => Some(LinkEvent::Closed),
            _ => None,
        }
    }
}
