//! Driver against an in-process TCP device simulator

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

mod simulator;

use std::sync::Arc;
use std::time::Duration;

use econet_protocol::{
    Credentials, DeviceClient, DriverConfig, EconetDevice, ExponentConvention, ParamValue,
    ParameterMap, TcpTransportConfig,
};
use simulator::{BoilerSimulator, SessionMode};

const MAP: &str = r#"{
    "tempcwu": { "id": 1281, "type": "BYTE", "exponent": 0 },
    "boilertemp": { "id": 1024, "type": "FLOAT", "exponent": 0 },
    "fuellevel": { "id": 2048, "type": "WORD", "exponent": -1 },
    "softversion": { "id": 9, "type": "STRING" }
}"#;

fn fast_config() -> DriverConfig {
    DriverConfig {
        read_timeout: Duration::from_millis(300),
        write_timeout: Duration::from_millis(300),
        read_backoff: Duration::from_millis(10),
        write_retry_delay: Duration::from_millis(10),
        ..DriverConfig::default()
    }
}

fn device(sim: &BoilerSimulator, config: DriverConfig) -> EconetDevice {
    let params = Arc::new(ParameterMap::from_json_str(MAP).unwrap());
    EconetDevice::with_tcp(
        TcpTransportConfig::new("127.0.0.1", sim.port()),
        params,
        config,
    )
    .unwrap()
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn test_read_with_session_echo() {
    let sim = BoilerSimulator::start().await;
    sim.set_value(1281, &[48]);
    let dev = device(&sim, fast_config());

    assert_eq!(
        dev.get_value("tempcwu", 3).await.unwrap(),
        Some(ParamValue::Int(48))
    );
    assert_eq!(sim.sessions(), vec![11]);
}

#[tokio::test]
async fn test_read_float_and_scaled_word() {
    let sim = BoilerSimulator::start().await;
    sim.set_value(1024, &[0x00, 0x00, 0x20, 0x41]);
    sim.set_value(2048, &[0xC8, 0x00]);
    let dev = device(&sim, fast_config());

    assert_eq!(
        dev.get_value("boilertemp", 1).await.unwrap(),
        Some(ParamValue::Float(10.0))
    );
    assert_eq!(
        dev.get_value("fuellevel", 1).await.unwrap(),
        Some(ParamValue::Float(20.0))
    );
}

#[tokio::test]
async fn test_read_scaled_word_divide_convention() {
    let sim = BoilerSimulator::start().await;
    sim.set_value(2048, &[0xC8, 0x00]);
    let dev = device(
        &sim,
        DriverConfig {
            exponent_convention: ExponentConvention::Divide,
            ..fast_config()
        },
    );

    // exponent -1 under Divide scales up
    assert_eq!(
        dev.get_value("fuellevel", 1).await.unwrap(),
        Some(ParamValue::Float(2000.0))
    );
}

#[tokio::test]
async fn test_read_string() {
    let sim = BoilerSimulator::start().await;
    sim.set_value(9, b"ecoMAX 860P\0");
    let dev = device(&sim, fast_config());

    assert_eq!(
        dev.get_value("softversion", 1).await.unwrap(),
        Some(ParamValue::Text("ecoMAX 860P".into()))
    );
}

#[tokio::test]
async fn test_read_wildcard_session_accepted() {
    let sim = BoilerSimulator::start().await;
    sim.set_value(1281, &[51]);
    sim.set_session_mode(SessionMode::Wildcard);
    let dev = device(&sim, fast_config());

    assert_eq!(
        dev.get_value("tempcwu", 1).await.unwrap(),
        Some(ParamValue::Int(51))
    );
}

#[tokio::test]
async fn test_session_mismatch_retries_then_none() {
    let sim = BoilerSimulator::start().await;
    sim.set_value(1281, &[51]);
    sim.set_session_mode(SessionMode::Wrong);
    let dev = device(&sim, fast_config());

    assert_eq!(dev.get_value("tempcwu", 3).await.unwrap(), None);
    assert_eq!(sim.request_count(), 3);
    assert_eq!(sim.sessions(), vec![11, 12, 13]);
}

#[tokio::test]
async fn test_noisy_fragmented_response() {
    let sim = BoilerSimulator::start().await;
    sim.set_value(1281, &[62]);
    sim.set_noisy(true);
    let dev = device(&sim, fast_config());

    assert_eq!(
        dev.get_value("tempcwu", 1).await.unwrap(),
        Some(ParamValue::Int(62))
    );
}

#[tokio::test]
async fn test_silent_device_times_out() {
    let sim = BoilerSimulator::start().await;
    sim.set_silent(true);
    let dev = device(&sim, fast_config());

    let start = std::time::Instant::now();
    assert_eq!(dev.get_value("tempcwu", 2).await.unwrap(), None);
    // two 300ms attempts
    assert!(start.elapsed() >= Duration::from_millis(600));
    assert_eq!(sim.request_count(), 2);
}

#[tokio::test]
async fn test_unreachable_device_is_none() {
    let sim = BoilerSimulator::start().await;
    let port = sim.port();
    drop(sim);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let params = Arc::new(ParameterMap::from_json_str(MAP).unwrap());
    let dev = EconetDevice::with_tcp(
        TcpTransportConfig::new("127.0.0.1", port),
        params,
        fast_config(),
    )
    .unwrap();
    assert_eq!(dev.get_value("tempcwu", 2).await.unwrap(), None);
    assert!(!dev
        .set_value("tempcwu", &ParamValue::Int(50), None)
        .await
        .unwrap());
}

// ============================================================================
// Writes
// ============================================================================

#[tokio::test]
async fn test_write_acknowledged() {
    let sim = BoilerSimulator::start().await;
    let dev = device(&sim, fast_config());

    assert!(dev
        .set_value("tempcwu", &ParamValue::Int(55), None)
        .await
        .unwrap());

    let writes = sim.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].user, "admin");
    assert_eq!(writes[0].password, "0000");
    assert_eq!(writes[0].id, 1281);
    assert_eq!(writes[0].value, vec![55]);

    // the simulator now serves the written value
    assert_eq!(
        dev.get_value("tempcwu", 1).await.unwrap(),
        Some(ParamValue::Int(55))
    );
}

#[tokio::test]
async fn test_write_with_explicit_credentials_and_scaling() {
    let sim = BoilerSimulator::start().await;
    let dev = device(&sim, fast_config());
    let creds = Credentials {
        user: "service".into(),
        password: "4321".into(),
    };

    assert!(dev
        .set_value("fuellevel", &ParamValue::Float(20.5), Some(&creds))
        .await
        .unwrap());
    let writes = sim.writes();
    assert_eq!(writes[0].user, "service");
    assert_eq!(writes[0].value, 205u16.to_le_bytes().to_vec());
}

#[tokio::test]
async fn test_write_without_ack_returns_false() {
    let sim = BoilerSimulator::start().await;
    sim.set_silent(true);
    let dev = device(&sim, fast_config());

    assert!(!dev
        .set_value("tempcwu", &ParamValue::Int(55), None)
        .await
        .unwrap());
    assert_eq!(sim.request_count(), 3);
}
