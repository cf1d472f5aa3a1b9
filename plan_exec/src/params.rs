//! # Planning Executable Parameters
//!
//! This module provides the parameters for the planning executable, loaded from `plan_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::{
    flight::{FlightParams, SimParams},
    mission::MissionParams,
    nav::PathPlannerParams,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanExecParams {
    pub mission: MissionParams,

    pub planner: PathPlannerParams,

    pub flight: FlightParams,

    pub sim: SimParams,
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
