// main.rs — levelbake driver
//
// Usage: levelbake [config.cfg] [+set name value ...]
//
// Bakes the built-in demo level with both pipelines and prints what each
// one produced. Cvars come from the optional config file first, then from
// the command line. Logging starts once both are applied.

use std::io;
use std::process::ExitCode;

use levelbake_common::common::{com_printf, com_warnf};
use levelbake_common::cvar::CvarContext;
use levelbake_common::level::{ActorKind, Level};
use levelbake_common::prefab;
use levelbake_paths::box_world::BoxWorld;
use levelbake_paths::{build_paths, PathBuildOptions};
use levelbake_zone::{build_zones, ZoneBuildOptions};

/// Apply the config file named by the first plain argument, then the
/// `+set` arguments on top. Returns a warning to report once logging is up.
fn load_config(cvars: &mut CvarContext, args: &[String], read: impl Fn(&str) -> io::Result<String>) -> Option<String> {
    let rest = cvars.exec_args(args);
    let path = rest.first()?;
    match read(path) {
        Ok(text) => {
            cvars.exec_text(&text);
            // command line wins over the file
            cvars.exec_args(args);
            None
        }
        Err(e) => Some(format!("couldn't exec {}: {}\n", path, e)),
    }
}

fn init_logging(cvars: &mut CvarContext) {
    let level = if cvars.value_or_default("developer", "0") != 0.0 {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .parse_default_env()
        .init();
}

fn bake_zones(cvars: &mut CvarContext) -> bool {
    let options = ZoneBuildOptions::from_cvars(cvars);
    let model = prefab::room_row([0.0; 3], [1024.0, 512.0, 256.0], &[(256.0, true), (512.0, false), (768.0, true)]);
    let mut level = Level::new(model);
    level.spawn(ActorKind::ZoneInfo, [128.0, 256.0, 64.0]);
    level.spawn(ActorKind::Light, [640.0, 256.0, 200.0]);

    match build_zones(&mut level, &options) {
        Ok((stats, vis)) => {
            com_printf(&format!("zones: {:?}\n", stats));
            if let Some(vis) = vis {
                com_printf(&format!(
                    "visibility: {} rows, {} bytes compressed\n",
                    vis.size,
                    vis.to_bytes().len()
                ));
            }
            true
        }
        Err(_) => false,
    }
}

fn bake_paths(cvars: &mut CvarContext) -> bool {
    let options = PathBuildOptions::from_cvars(cvars);
    let world = BoxWorld::room_with_divider([0.0; 3], [1024.0, 512.0, 256.0], 480.0, 544.0, 320.0);
    let mut level = Level::default();
    level.spawn(ActorKind::PlayerStart, [200.0, 450.0, 40.0]);
    level.spawn(ActorKind::Pickup, [800.0, 100.0, 40.0]);

    match build_paths(&mut level, &world, &options) {
        Ok(stats) => {
            com_printf(&format!("paths: {:?}\n", stats));
            for i in level.path_nodes() {
                let node = &level.actors[i];
                com_printf(&format!(
                    "  {} at ({:.1} {:.1} {:.1}), {} paths\n",
                    node.name,
                    node.location[0],
                    node.location[1],
                    node.location[2],
                    level.paths_from(i).len()
                ));
            }
            true
        }
        Err(_) => false,
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cvars = CvarContext::new();
    let warning = load_config(&mut cvars, &args, |path| std::fs::read_to_string(path));
    init_logging(&mut cvars);
    if let Some(warning) = warning {
        com_warnf(&warning);
    }

    let zones_ok = bake_zones(&mut cvars);
    let paths_ok = bake_paths(&mut cvars);
    if zones_ok && paths_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

// ============================================================
// Tests
// ============================================================
