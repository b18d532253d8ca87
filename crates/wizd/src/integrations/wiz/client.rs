use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::debug;
use tracing::trace;

use super::bulb::BulbType;
use super::error::WizError;
use super::protocol;
use super::protocol::PilotBuilder;
use super::protocol::PilotState;
use super::protocol::Request;
use super::protocol::Response;
use super::protocol::SystemConfig;

/// How long to wait for a reply before sending the request again.
/// Bulbs drop UDP packets while busy, so one datagram is not enough.
const RESEND_INTERVAL: Duration = Duration::from_millis(750);

const MAX_DATAGRAM: usize = 4096;

/// Trait for WiZ bulb operations
///
/// This trait allows for mocking the device client for testing purposes
#[async_trait]
pub trait WizClient: Send + Sync {
    /// Address the client talks to, for log messages
    fn ip(&self) -> &str;

    /// Fetch the current pilot. `Ok(None)` means the bulb answered without data.
    async fn update_state(&mut self) -> Result<Option<PilotState>, WizError>;

    /// Fetch the module name and resolve it against the bulb library
    async fn get_bulb_type(&mut self) -> Result<BulbType, WizError>;

    /// Fetch the bulb's MAC address
    async fn get_mac(&mut self) -> Result<String, WizError>;

    /// Send one pilot; the bulb is switched on as part of it
    async fn turn_on(&mut self, pilot: PilotBuilder) -> Result<(), WizError>;

    async fn turn_off(&mut self) -> Result<(), WizError>;
}

/// Creates clients for configured hosts
#[async_trait]
pub trait WizConnector: Send + Sync {
    type Client: WizClient + 'static;

    /// Resolve `host` and prepare a client. Fails with `Connection` when the
    /// host cannot be resolved.
    async fn connect(&self, host: &str) -> Result<Self::Client, WizError>;
}

/// Connects real bulbs over UDP
#[derive(Debug, Clone)]
pub struct UdpConnector {
    timeout: Duration,
}

impl UdpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl WizConnector for UdpConnector {
    type Client = UdpWizClient;

    async fn connect(&self, host: &str) -> Result<UdpWizClient, WizError> {
        let addr = tokio::net::lookup_host((host, protocol::PORT))
            .await
            .map_err(WizError::Connection)?
            .next()
            .ok_or_else(|| {
                WizError::Connection(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("No address found for {}", host),
                ))
            })?;

        Ok(UdpWizClient::new(host.to_string(), addr, self.timeout))
    }
}

/// Real WiZ client speaking JSON over UDP
#[derive(Debug)]
pub struct UdpWizClient {
    ip: String,
    addr: SocketAddr,
    timeout: Duration,
}

impl UdpWizClient {
    pub fn new(ip: String, addr: SocketAddr, timeout: Duration) -> Self {
        Self { ip, addr, timeout }
    }

    /// Send a request and wait for the matching reply, resending until the
    /// overall timeout expires.
    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<serde_json::Value>, WizError> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))
            .await
            .map_err(WizError::Connection)?;
        socket
            .connect(self.addr)
            .await
            .map_err(WizError::Connection)?;

        let payload = serde_json::to_vec(&Request { method, params })?;
        let deadline = Instant::now() + self.timeout;
        let mut buf = [0u8; MAX_DATAGRAM];

        loop {
            trace!("[wizlight {}] -> {}", self.ip, String::from_utf8_lossy(&payload));
            socket.send(&payload).await.map_err(WizError::Connection)?;

            let now = Instant::now();
            if now >= deadline {
                return Err(WizError::Timeout);
            }
            let wait = RESEND_INTERVAL.min(deadline - now);

            match tokio::time::timeout(wait, socket.recv(&mut buf)).await {
                Ok(Ok(len)) => {
                    trace!(
                        "[wizlight {}] <- {}",
                        self.ip,
                        String::from_utf8_lossy(&buf[..len])
                    );
                    let response: Response = serde_json::from_slice(&buf[..len])?;
                    return response.into_result();
                }
                Ok(Err(e)) => return Err(WizError::Connection(e)),
                Err(_) => {
                    if Instant::now() >= deadline {
                        return Err(WizError::Timeout);
                    }
                    debug!("[wizlight {}] no reply to {}, resending", self.ip, method);
                }
            }
        }
    }

    async fn system_config(&self) -> Result<SystemConfig, WizError> {
        let result = self
            .request(protocol::METHOD_GET_SYSTEM_CONFIG, serde_json::json!({}))
            .await?
            .unwrap_or_else(|| serde_json::json!({}));
        Ok(serde_json::from_value(result)?)
    }
}

#[async_trait]
impl WizClient for UdpWizClient {
    fn ip(&self) -> &str {
        &self.ip
    }

    async fn update_state(&mut self) -> Result<Option<PilotState>, WizError> {
        let result = self
            .request(protocol::METHOD_GET_PILOT, serde_json::json!({}))
            .await?;
        match result {
            Some(result) => Ok(Some(serde_json::from_value(result)?)),
            None => Ok(None),
        }
    }

    async fn get_bulb_type(&mut self) -> Result<BulbType, WizError> {
        let config = self.system_config().await?;
        debug!(
            "[wizlight {}] module {:?}, firmware {:?}",
            self.ip, config.module_name, config.fw_version
        );
        let module_name = config.module_name.unwrap_or_default();
        Ok(BulbType::from_module_name(&module_name))
    }

    async fn get_mac(&mut self) -> Result<String, WizError> {
        let config = self.system_config().await?;
        config.mac.ok_or_else(|| WizError::Device {
            code: 0,
            message: "getSystemConfig reply has no mac".to_string(),
        })
    }

    async fn turn_on(&mut self, pilot: PilotBuilder) -> Result<(), WizError> {
        self.request(protocol::METHOD_SET_PILOT, pilot.params())
            .await
            .map(|_| ())
    }

    async fn turn_off(&mut self) -> Result<(), WizError> {
        self.request(protocol::METHOD_SET_PILOT, protocol::off_params())
            .await
            .map(|_| ())
    }
}

/// Mock WiZ client for testing
///
/// `None` in `pilot`, `bulb_type` or `mac` makes the matching call time out.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockWizClient {
    pub pilot: Option<PilotState>,
    /// Answer `getPilot` without a result instead of timing out
    pub empty_reply: bool,
    pub bulb_type: Option<BulbType>,
    pub mac: Option<String>,
    /// Makes every query fail with this error instead of answering
    pub fail_with: Option<fn() -> WizError>,
    pub sent: Vec<PilotBuilder>,
    pub off_count: usize,
    pub bulb_type_calls: usize,
    pub mac_calls: usize,
}

#[cfg(test)]
impl MockWizClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bulb that answers every query
    pub fn online(pilot: serde_json::Value, module_name: &str, mac: &str) -> Self {
        Self {
            pilot: Some(serde_json::from_value(pilot).unwrap()),
            bulb_type: Some(BulbType::from_module_name(module_name)),
            mac: Some(mac.to_string()),
            ..Self::default()
        }
    }

    pub fn set_pilot(&mut self, pilot: serde_json::Value) {
        self.pilot = Some(serde_json::from_value(pilot).unwrap());
    }
}

#[cfg(test)]
#[async_trait]
impl WizClient for MockWizClient {
    fn ip(&self) -> &str {
        "192.0.2.1"
    }

    async fn update_state(&mut self) -> Result<Option<PilotState>, WizError> {
        if let Some(fail) = self.fail_with {
            return Err(fail());
        }
        if self.empty_reply {
            return Ok(None);
        }
        self.pilot.clone().map(Some).ok_or(WizError::Timeout)
    }

    async fn get_bulb_type(&mut self) -> Result<BulbType, WizError> {
        self.bulb_type_calls += 1;
        if let Some(fail) = self.fail_with {
            return Err(fail());
        }
        self.bulb_type.clone().ok_or(WizError::Timeout)
    }

    async fn get_mac(&mut self) -> Result<String, WizError> {
        self.mac_calls += 1;
        if let Some(fail) = self.fail_with {
            return Err(fail());
        }
        self.mac.clone().ok_or(WizError::Timeout)
    }

    async fn turn_on(&mut self, pilot: PilotBuilder) -> Result<(), WizError> {
        self.sent.push(pilot);
        Ok(())
    }

    async fn turn_off(&mut self) -> Result<(), WizError> {
        self.off_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    /// Bind a fake bulb on localhost that answers each request with `reply(request)`.
    async fn fake_bulb(
        reply: impl Fn(serde_json::Value) -> Option<serde_json::Value> + Send + 'static,
    ) -> SocketAddr {
        let socket = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; MAX_DATAGRAM];
            loop {
                let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let request: serde_json::Value = serde_json::from_slice(&buf[..len]).unwrap();
                if let Some(response) = reply(request) {
                    let bytes = serde_json::to_vec(&response).unwrap();
                    socket.send_to(&bytes, peer).await.unwrap();
                }
            }
        });
        addr
    }

    fn client(addr: SocketAddr, timeout: Duration) -> UdpWizClient {
        UdpWizClient::new("127.0.0.1".to_string(), addr, timeout)
    }

    #[tokio::test]
    async fn test_get_pilot_over_udp() {
        let addr = fake_bulb(|request| {
            assert_eq!(request["method"], "getPilot");
            Some(json!({
                "method": "getPilot",
                "env": "pro",
                "result": {"mac": "a8bb50aabbcc", "state": true, "temp": 4200, "dimming": 80}
            }))
        })
        .await;

        let mut client = client(addr, Duration::from_secs(2));
        let pilot = client.update_state().await.unwrap().unwrap();
        assert!(pilot.state);
        assert_eq!(pilot.colortemp(), Some(4200));
        assert_eq!(pilot.brightness(), Some(204));
    }

    #[tokio::test]
    async fn test_system_config_gives_bulb_type_and_mac() {
        let addr = fake_bulb(|_| {
            Some(json!({
                "method": "getSystemConfig",
                "result": {
                    "mac": "a8bb50aabbcc",
                    "homeId": 12345,
                    "moduleName": "ESP56_SHTW3_01",
                    "fwVersion": "1.18.0"
                }
            }))
        })
        .await;

        let mut client = client(addr, Duration::from_secs(2));
        let bulb_type = client.get_bulb_type().await.unwrap();
        assert_eq!(bulb_type.name, "ESP56_SHTW3_01");
        assert!(bulb_type.is_known());
        assert_eq!(client.get_mac().await.unwrap(), "a8bb50aabbcc");
    }

    #[tokio::test]
    async fn test_set_pilot_sends_params() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let addr = fake_bulb(move |request| {
            tx.send(request).unwrap();
            Some(json!({"method": "setPilot", "result": {"success": true}}))
        })
        .await;

        let mut client = client(addr, Duration::from_secs(2));
        client
            .turn_on(PilotBuilder::new().with_colortemp(Some(3000)))
            .await
            .unwrap();
        client.turn_off().await.unwrap();

        let on = rx.recv().await.unwrap();
        assert_eq!(on["method"], "setPilot");
        assert_eq!(on["params"], json!({"state": true, "temp": 3000}));
        let off = rx.recv().await.unwrap();
        assert_eq!(off["params"], json!({"state": false}));
    }

    #[tokio::test]
    async fn test_silent_bulb_times_out() {
        let addr = fake_bulb(|_| None).await;

        let mut client = client(addr, Duration::from_millis(300));
        let err = client.update_state().await.unwrap_err();
        assert!(matches!(err, WizError::Timeout));
    }

    #[tokio::test]
    async fn test_device_error_is_reported() {
        let addr = fake_bulb(|_| {
            Some(json!({"error": {"code": -32600, "message": "Invalid Request"}}))
        })
        .await;

        let mut client = client(addr, Duration::from_secs(2));
        let err = client.turn_off().await.unwrap_err();
        assert!(matches!(err, WizError::Device { code: -32600, .. }));
    }

    #[tokio::test]
    async fn test_reply_without_result_is_empty_state() {
        let addr = fake_bulb(|_| Some(json!({"method": "getPilot"}))).await;

        let mut client = client(addr, Duration::from_secs(2));
        assert_eq!(client.update_state().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_connector_rejects_unresolvable_host() {
        let connector = UdpConnector::new(Duration::from_secs(1));
        let err = connector.connect("bulb.invalid").await.unwrap_err();
        assert!(matches!(err, WizError::Connection(_)));
    }
}
