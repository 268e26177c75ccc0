use futures::FutureExt;
use zenoh::pubsub::Publisher;
use zenoh::qos::CongestionControl;
use zenoh::{Session, Wait};

use super::{BrokerClient, ConnectError, PendingDelivery, SubmitError};
use crate::config::BrokerConfig;
use crate::publisher::DeliveryOutcome;

/// Zenoh publisher on key expression `topic`.
///
/// Zenoh has no broker-side durability acknowledgement: a delivery counts as
/// `Acknowledged` once the session accepted the sample. Congestion control is
/// `Block`, so a congested link stalls `submit` (and the worker thread running
/// it) instead of dropping samples. The stall ends when the transmit queue
/// drains or Zenoh gives up on the link, in which case `put` fails and the
/// event is recorded as failed.
pub struct ZenohBroker {
    session: Session,
    publisher: Publisher<'static>,
}

impl ZenohBroker {
    pub async fn connect(config: &BrokerConfig, topic: &str) -> Result<Self, ConnectError> {
        let zenoh_config = session_config(&config.bootstrap)?;

        let session = tokio::time::timeout(config.connect_timeout(), zenoh::open(zenoh_config))
            .await
            .map_err(|_| ConnectError::Timeout(config.connect_timeout()))?
            .map_err(|e| ConnectError::Zenoh(format!("Failed to open Zenoh session: {}", e)))?;

        let publisher = session
            .declare_publisher(topic.to_string())
            .congestion_control(CongestionControl::Block)
            .await
            .map_err(|e| ConnectError::Zenoh(format!("Failed to declare publisher: {}", e)))?;

        log::info!("Connected to Zenoh, publishing on '{}'", topic);
        Ok(Self { session, publisher })
    }
}

/// Client-mode session config routed through the router at `endpoint`.
fn session_config(endpoint: &str) -> Result<zenoh::Config, ConnectError> {
    let mut config = zenoh::Config::default();
    config
        .insert_json5("mode", r#""client""#)
        .map_err(|e| ConnectError::Zenoh(format!("Failed to set Zenoh mode: {}", e)))?;
    config
        .insert_json5("connect/endpoints", &format!(r#"["{}"]"#, endpoint))
        .map_err(|e| ConnectError::Zenoh(format!("Failed to set Zenoh endpoint: {}", e)))?;
    config
        .insert_json5("scouting/multicast/enabled", "false")
        .map_err(|e| ConnectError::Zenoh(format!("Failed to disable multicast: {}", e)))?;
    Ok(config)
}

#[async_trait::async_trait]
impl BrokerClient for ZenohBroker {
    fn submit(&mut self, payload: &[u8]) -> Result<PendingDelivery, SubmitError> {
        // put resolves synchronously, which keeps samples in submission order
        let outcome = match self.publisher.put(payload.to_vec()).wait() {
            Ok(()) => DeliveryOutcome::Acknowledged,
            Err(e) => DeliveryOutcome::Failed(e.to_string()),
        };
        Ok(futures::future::ready(outcome).boxed())
    }

    async fn close(self: Box<Self>) {
        let Self { session, publisher } = *self;
        if let Err(e) = publisher.undeclare().await {
            log::warn!("Failed to undeclare Zenoh publisher: {}", e);
        }
        match session.close().await {
            Ok(()) => log::debug!("Zenoh session closed"),
            Err(e) => log::warn!("Zenoh close failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_client_mode() {
        let config = session_config("tcp/10.0.0.5:7447").unwrap();
        assert!(config.get_json("mode").unwrap().contains("client"));
        assert!(config
            .get_json("connect/endpoints")
            .unwrap()
            .contains("tcp/10.0.0.5:7447"));
    }

    #[test]
    fn test_session_config_rejects_garbage_endpoint() {
        assert!(matches!(
            session_config(r#"tcp/a"b"#),
            Err(ConnectError::Zenoh(_))
        ));
    }
}
