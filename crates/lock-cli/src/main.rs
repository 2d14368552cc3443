use std::env;
use std::net::SocketAddr;

use contracts::{Command, CommandPayload, CommandType, LockConfig};
use lock_api::{serve, EngineApi};
use lock_core::world::VehicleWorld;

fn print_usage() {
    println!("lock-cli <command>");
    println!("commands:");
    println!("  status");
    println!("  step [n]");
    println!("  serve [addr]");
    println!("    default addr: 127.0.0.1:8080");
    println!("  simulate <seed> [ticks] [sqlite_path]");
    println!("    runs the demo scene to the target tick and persists the journal");
    println!();
    println!("configuration is read from $LOCKS_CONFIG_PATH (default vehicle_locks.json)");
}

fn load_config() -> LockConfig {
    let path = env::var("LOCKS_CONFIG_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "vehicle_locks.json".to_string());

    match std::fs::read_to_string(&path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("configuration file {path} is invalid ({err}); using defaults");
                LockConfig::default()
            }
        },
        Err(_) => LockConfig::default(),
    }
}

fn parse_u64(value: Option<&String>, label: &str) -> Result<u64, String> {
    let raw = value.ok_or_else(|| format!("missing {label}"))?;
    raw.parse::<u64>()
        .map_err(|_| format!("invalid {label}: {raw}"))
}

fn parse_socket_addr(value: Option<&String>) -> Result<SocketAddr, String> {
    let raw = value.map(String::as_str).unwrap_or("127.0.0.1:8080");
    raw.parse::<SocketAddr>()
        .map_err(|_| format!("invalid addr: {raw}"))
}

fn default_sqlite_path() -> String {
    env::var("LOCKS_SQLITE_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "vehicle_locks.sqlite".to_string())
}

fn run_simulation(args: &[String]) -> Result<(), String> {
    let seed = parse_u64(args.get(2), "seed")?;
    let ticks = args
        .get(3)
        .map(|value| {
            value
                .parse::<u64>()
                .map_err(|_| format!("invalid ticks: {value}"))
        })
        .transpose()?
        .unwrap_or(600);
    let sqlite_path = args
        .get(4)
        .cloned()
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(default_sqlite_path);

    let mut api = EngineApi::with_world(VehicleWorld::demo_world(seed));
    api.attach_sqlite_store(&sqlite_path)
        .map_err(|err| format!("failed to attach sqlite store: {err}"))?;

    // The demo scene's first player deploys onto their look target, then the
    // world runs until the auto-unlock scheduler has had its say.
    let deploy = Command::new(
        "cli_deploy_1",
        0,
        CommandType::DeployCodeLock,
        CommandPayload::DeployCodeLock { player_id: 1001 },
    );
    let result = api.submit_command(deploy);
    if let Some(lock_id) = result.deployed_lock {
        api.world_mut().set_lock_engaged(lock_id, true);
    }

    let status = api.step(ticks);
    if let Some(error) = api.last_persistence_error() {
        return Err(format!("persistence error after simulation: {error}"));
    }

    println!(
        "simulated seed={} {} events={} sqlite={}",
        seed,
        status,
        api.events().len(),
        sqlite_path
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    match command {
        Some("status") => {
            let api = EngineApi::from_config(load_config());
            println!("{}", api.status());
        }
        Some("step") => {
            let steps = args.get(2).and_then(|v| v.parse::<u64>().ok()).unwrap_or(1);
            let mut api = EngineApi::with_world(VehicleWorld::demo_world(1337));
            let status = api.step(steps);
            println!("{status}");
        }
        Some("serve") => match parse_socket_addr(args.get(2)) {
            Ok(addr) => {
                let mut world = VehicleWorld::demo_world(1337);
                world.set_config(load_config());
                let api = EngineApi::with_world(world);
                println!("serving lock api on http://{addr}");
                if let Err(err) = serve(addr, api).await {
                    eprintln!("server error: {err}");
                    std::process::exit(1);
                }
            }
            Err(err) => {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        },
        Some("simulate") => {
            if let Err(err) = run_simulation(&args) {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        }
        _ => {
            print_usage();
        }
    }
}
