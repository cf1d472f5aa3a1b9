//! Main planning executable entry point.
//!
//! # Architecture
//!
//! The executable flies a single mission against the simulated vehicle:
//!
//!     - Initialise the session and logging
//!     - Load parameters and the colliders file
//!     - Main loop, until the vehicle is handed back or the cycle limit is hit:
//!         - Step the simulation
//!         - Pass position, velocity and state events to the flight manager

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::path::PathBuf;

use color_eyre::{eyre::WrapErr, Report};
use log::{info, warn};
use nalgebra::Vector2;
use structopt::StructOpt;

// Internal
use plan_lib::{
    flight::{run_mission, FlightMgr, SimVehicle},
    loader,
    mission::MissionPlanner,
    params::PlanExecParams,
};
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Plan and fly a mission through a field of obstacles
#[derive(Debug, StructOpt)]
#[structopt(name = "plan_exec")]
struct Opts {
    /// Path to the colliders file
    #[structopt(parse(from_os_str))]
    colliders: PathBuf,

    /// North position of the goal in the local frame, in meters
    #[structopt(long, allow_hyphen_values = true)]
    goal_north: f64,

    /// East position of the goal in the local frame, in meters
    #[structopt(long, allow_hyphen_values = true)]
    goal_east: f64,

    /// Parameter file, relative to the params directory
    #[structopt(long, default_value = "plan_exec.toml")]
    params: String,

    /// Parameter file path, used instead of `--params` if given
    #[structopt(long, parse(from_os_str))]
    params_path: Option<PathBuf>,

    /// Maximum number of simulation cycles
    #[structopt(long, default_value = "20000")]
    max_cycles: usize,

    /// Log at trace level rather than debug
    #[structopt(short, long)]
    verbose: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("plan_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    let level = if opts.verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    logger_init(level, &session).wrap_err("Failed to initialise logging")?;

    info!("Waypath Planning Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: Result<PlanExecParams, _> = match opts.params_path {
        Some(ref path) => util::params::load_from_path(path),
        None => util::params::load(&opts.params),
    };
    let params = params.wrap_err("Could not load plan_exec params")?;

    info!("Exec parameters loaded");

    let colliders = loader::load_colliders(&opts.colliders)
        .wrap_err_with(|| format!("Could not load colliders from {:?}", opts.colliders))?;

    // ---- INITIALISE MODULES ----

    let planner = MissionPlanner::new(params.mission.clone(), params.planner.clone());
    let goal_local_m = Vector2::new(opts.goal_north, opts.goal_east);

    let mut flight_mgr = FlightMgr::new(params.flight.clone(), planner, colliders, goal_local_m);
    let mut vehicle = SimVehicle::new(params.sim.clone());

    info!("Initialisation complete, starting mission\n");

    // ---- MAIN LOOP ----

    let result = run_mission(&mut flight_mgr, &mut vehicle, opts.max_cycles);

    match flight_mgr.plan() {
        Some(plan) => info!(
            "Flew {} waypoints, path cost {:.3}",
            plan.waypoints.len(),
            plan.cost
        ),
        None => warn!("No plan was flown"),
    }
    if let Some(e) = flight_mgr.planning_error() {
        warn!("Planning failed: {}", e);
    }

    let result = result.wrap_err("Mission failed");
    if let Ok(cycles) = &result {
        info!("Mission took {} cycles", cycles);
    }

    // ---- SHUTDOWN ----

    info!("End of execution");
    session.exit();

    result.map(|_| ())
}
