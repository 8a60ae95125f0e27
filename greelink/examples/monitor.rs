//! Discover, bind and watch a single appliance, flipping power once bound

use greelink::{CommandTable, DeviceConfig, Event};

#[tokio::main]
async fn main() -> greelink::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "greelink=debug".into()),
        )
        .init();

    // Change to your appliance IP
    let ip = std::env::var("DEVICE_IP")
        .unwrap_or_else(|_| "192.168.1.60".to_string())
        .parse()
        .expect("DEVICE_IP must be an IP address");

    // The driver only needs the flattened code list; the names and value
    // constants are for this application's own use.
    let table = CommandTable::new()
        .define_with_values("power", "Pow", [("off", 0), ("on", 1)])
        .define_with_values("mode", "Mod", [("auto", 0), ("cool", 1), ("heat", 4)])
        .define("temperature", "SetTem")
        .define("fan", "WdSpd");

    println!("Scanning {ip}...");
    let (device, mut events) = DeviceConfig::new(ip)
        .with_poll_columns(table.codes())
        .connect();

    while let Some(event) = events.recv().await {
        match event {
            Event::Connected => {
                println!("✓ Bound: {}", device.info().expect("identified"));
                device.set_property(table.code("power")?, table.wire_value("power", "on")?)?;
            }
            Event::Status | Event::Update => {
                println!("✓ Properties: {:?}", device.properties());
            }
            Event::Error(e) => eprintln!("✗ {e}"),
            Event::Disconnected => eprintln!("✗ Socket unavailable, retrying..."),
        }
    }

    Ok(())
}
