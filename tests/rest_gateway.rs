//! RestDeviceProxy against a local stand-in for the Tango REST gateway
//!
//! The stand-in is a hyper server that records each request and answers it
//! with a canned JSON body.

use hyper::header::{HeaderMap, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server};
use lima_acq::acquisition::params::{attr, cmd};
use lima_acq::acquisition::{AcquisitionConfig, AcquisitionRunner, AcquisitionStatus};
use lima_acq::config::RestBackendConfig;
use lima_acq::error::AcqError;
use lima_acq::tango::rest::RestDeviceProxy;
use lima_acq::tango::{AttrValue, DeviceName, DeviceProxy};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    target: String,
    headers: HeaderMap,
    body: String,
}

impl Recorded {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

type RequestLog = Arc<Mutex<Vec<Recorded>>>;
type Handler = Arc<dyn Fn(&Recorded) -> (u16, String) + Send + Sync>;

async fn spawn_gateway(handler: Handler) -> (String, RequestLog) {
    let log: RequestLog = Arc::new(Mutex::new(Vec::new()));

    let service_log = log.clone();
    let make_service = make_service_fn(move |_conn| {
        let handler = handler.clone();
        let log = service_log.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                record_and_reply(req, handler.clone(), log.clone())
            }))
        }
    });

    let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_service);
    let addr = server.local_addr();
    tokio::spawn(server);

    (format!("http://{}", addr), log)
}

async fn record_and_reply(
    req: Request<Body>,
    handler: Handler,
    log: RequestLog,
) -> Result<Response<Body>, hyper::Error> {
    let method = req.method().clone();
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();
    let headers = req.headers().clone();
    let body = hyper::body::to_bytes(req.into_body()).await?;

    let request = Recorded {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    let (status, reply) = handler(&request);
    log.lock().unwrap().push(request);

    Ok(Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(reply))
        .unwrap())
}

fn rest_config(url: &str) -> RestBackendConfig {
    RestBackendConfig {
        url: url.to_string(),
        tango_host: "tango-db".to_string(),
        tango_port: 10000,
        username: None,
        password: None,
        timeout: Duration::from_secs(2),
    }
}

fn lima_proxy(url: &str) -> RestDeviceProxy {
    RestDeviceProxy::new(DeviceName::parse("limaccd/tango/1").unwrap(), &rest_config(url)).unwrap()
}

const DEVICE_PATH: &str = "/tango/rest/rc4/hosts/tango-db/10000/devices/limaccd/tango/1";

#[tokio::test]
async fn test_read_attribute_uses_get() {
    let (url, log) = spawn_gateway(Arc::new(|_: &Recorded| {
        (
            200,
            r#"{"name":"acq_status","value":"Running","quality":"ATTR_VALID","timestamp":1712345678901}"#
                .to_string(),
        )
    }))
    .await;

    let reading = lima_proxy(&url).read_attribute(attr::ACQ_STATUS).await.unwrap();
    assert_eq!(reading.value.as_str(), Some("Running"));

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].method, Method::GET);
    assert_eq!(log[0].target, format!("{}/attributes/acq_status/value", DEVICE_PATH));
    assert!(log[0].header("authorization").is_none());
}

#[tokio::test]
async fn test_write_attribute_puts_value_in_query() {
    let (url, log) = spawn_gateway(Arc::new(|r: &Recorded| {
        (200, format!(r#"{{"name":"x","value":"{}","quality":"ATTR_VALID"}}"#, r.target.len()))
    }))
    .await;

    let proxy = lima_proxy(&url);
    proxy
        .write_attribute(attr::ACQ_EXPO_TIME, AttrValue::Double(0.01))
        .await
        .unwrap();
    proxy
        .write_attribute(attr::ACQ_TRIGGER_MODE, AttrValue::from("INTERNAL_TRIGGER"))
        .await
        .unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log[0].method, Method::PUT);
    assert_eq!(
        log[0].target,
        format!("{}/attributes/acq_expo_time/value?v=0.01", DEVICE_PATH)
    );
    assert_eq!(
        log[1].target,
        format!("{}/attributes/acq_trigger_mode/value?v=INTERNAL_TRIGGER", DEVICE_PATH)
    );
}

#[tokio::test]
async fn test_command_body_only_with_input() {
    let (url, log) = spawn_gateway(Arc::new(|r: &Recorded| {
        if r.body.is_empty() {
            (200, r#"{"name":"prepareAcq","output":null}"#.to_string())
        } else {
            (200, r#"{"name":"echo","output":42}"#.to_string())
        }
    }))
    .await;

    let proxy = lima_proxy(&url);
    let output = proxy.command_inout(cmd::PREPARE_ACQ, None).await.unwrap();
    assert_eq!(output, None);

    let output = proxy
        .command_inout("echo", Some(AttrValue::Long(42)))
        .await
        .unwrap();
    assert_eq!(output, Some(AttrValue::Long(42)));

    let log = log.lock().unwrap();
    assert_eq!(log[0].method, Method::PUT);
    assert_eq!(log[0].target, format!("{}/commands/prepareAcq", DEVICE_PATH));
    assert!(log[0].body.is_empty());
    assert_eq!(log[1].body, r#"{"input":42}"#);
    assert_eq!(log[1].header("content-type"), Some("application/json"));
}

#[tokio::test]
async fn test_error_stack_maps_to_dev_failed() {
    let (url, _log) = spawn_gateway(Arc::new(|_: &Recorded| {
        (
            400,
            r#"{"errors":[{"reason":"LIMA_Exception","description":"Run prepareAcq before starting acquisition","severity":"ERR","origin":"CtControl::startAcq"}],"quality":"FAILURE","timestamp":0}"#
                .to_string(),
        )
    }))
    .await;

    let err = lima_proxy(&url)
        .command_inout(cmd::START_ACQ, None)
        .await
        .unwrap_err();
    match err {
        AcqError::DevFailed {
            device,
            reason,
            description,
            origin,
        } => {
            assert_eq!(device, "limaccd/tango/1");
            assert_eq!(reason, "LIMA_Exception");
            assert_eq!(description, "Run prepareAcq before starting acquisition");
            assert_eq!(origin, "CtControl::startAcq");
        }
        other => panic!("expected DevFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_basic_auth_header() {
    let (url, log) = spawn_gateway(Arc::new(|_: &Recorded| {
        (200, r#"{"name":"frame_rate","value":10.0,"quality":"ATTR_VALID"}"#.to_string())
    }))
    .await;

    let mut config = rest_config(&url);
    config.username = Some("tango-cs".to_string());
    config.password = Some("tango".to_string());
    let proxy =
        RestDeviceProxy::new(DeviceName::parse("pointgrey/tango/1").unwrap(), &config).unwrap();

    let reading = proxy.read_attribute(attr::FRAME_RATE).await.unwrap();
    assert_eq!(reading.value, AttrValue::Double(10.0));

    let log = log.lock().unwrap();
    assert_eq!(log[0].header("authorization"), Some("Basic dGFuZ28tY3M6dGFuZ28="));
}

#[tokio::test]
async fn test_malformed_reading_is_an_error() {
    let (url, _log) = spawn_gateway(Arc::new(|_: &Recorded| (200, "not json".to_string()))).await;

    let err = lima_proxy(&url).read_attribute(attr::ACQ_STATUS).await.unwrap_err();
    assert!(matches!(err, AcqError::MalformedResponse { .. }));
}

#[tokio::test]
async fn test_silent_gateway_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let mut config = rest_config(&url);
    config.timeout = Duration::from_millis(100);
    let proxy =
        RestDeviceProxy::new(DeviceName::parse("limaccd/tango/1").unwrap(), &config).unwrap();

    let err = proxy.read_attribute(attr::ACQ_STATUS).await.unwrap_err();
    assert!(matches!(err, AcqError::Transport { .. }));
    assert!(err.to_string().contains("no response within"));
}

#[tokio::test]
async fn test_runner_over_gateway() {
    let status_reads = Arc::new(AtomicUsize::new(0));
    let reads = status_reads.clone();
    let (url, log) = spawn_gateway(Arc::new(move |r: &Recorded| {
        if r.method == Method::GET && r.target.ends_with("/attributes/acq_status/value") {
            let n = reads.fetch_add(1, Ordering::SeqCst);
            let label = if n < 2 { "Running" } else { "Ready" };
            (200, format!(r#"{{"name":"acq_status","value":"{}"}}"#, label))
        } else if r.target.contains("/commands/") {
            (200, r#"{"output":null}"#.to_string())
        } else {
            (200, r#"{"name":"x","value":0}"#.to_string())
        }
    }))
    .await;

    let config = rest_config(&url);
    let lima = RestDeviceProxy::new(DeviceName::parse("limaccd/tango/1").unwrap(), &config).unwrap();
    let camera =
        RestDeviceProxy::new(DeviceName::parse("pointgrey/tango/1").unwrap(), &config).unwrap();
    let runner = AcquisitionRunner::new(
        lima,
        camera,
        AcquisitionConfig::default(),
        Duration::from_millis(10),
    );

    let report = runner.run_once(0).await.unwrap();
    assert_eq!(report.polls, 3);
    assert_eq!(report.final_status, AcquisitionStatus::Ready);

    let log = log.lock().unwrap();
    let targets: Vec<&str> = log.iter().map(|r| r.target.as_str()).collect();
    assert_eq!(log.len(), 5 + 2 + 3);
    assert!(targets[4].contains("/devices/pointgrey/tango/1/attributes/frame_rate/value?v=10"));
    assert!(targets[5].ends_with("/commands/prepareAcq"));
    assert!(targets[6].ends_with("/commands/startAcq"));
}
