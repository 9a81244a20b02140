//! Renders ARGoS experiment files for a candidate genome.
//!
//! Only the `<CPFA/>` attributes and the experiment seed vary between trials;
//! robot count, simulated duration and library paths come from the run
//! settings, everything else is a fixed environment.

use crate::config::{Platform, RunConfig};
use crate::engines::generation::{Genome, ParameterBounds};
use crate::error::{CpfaError, Result};
use std::fmt::Write;

/// Simulation steps per simulated second.
pub const TICKS_PER_SECOND: u32 = 16;

#[derive(Debug, Clone)]
pub struct ConfigurationSerializer {
    bounds: ParameterBounds,
    robots: usize,
    length: u64,
    platform: Platform,
}

impl ConfigurationSerializer {
    pub fn new(bounds: ParameterBounds, robots: usize, length: u64, platform: Platform) -> Self {
        Self {
            bounds,
            robots,
            length,
            platform,
        }
    }

    pub fn from_config(bounds: ParameterBounds, config: &RunConfig) -> Self {
        Self::new(bounds, config.robots, config.length, config.system)
    }

    /// Just the `<CPFA .../>` element for `genome`.
    pub fn render_cpfa_chunk(&self, genome: &Genome) -> Result<String> {
        if genome.len() != self.bounds.len() {
            return Err(CpfaError::Configuration(format!(
                "Genome has {} genes, expected {}",
                genome.len(),
                self.bounds.len()
            )));
        }

        let mut out = String::from("<CPFA");
        for (i, (name, value)) in genome.named(&self.bounds).enumerate() {
            if i > 0 {
                out.push_str("\n     ");
            }
            let _ = write!(out, " {}=\"{}\"", name, value);
        }
        out.push_str("/>");
        Ok(out)
    }

    /// Full experiment document for one trial of `genome` under `seed`.
    pub fn render(&self, genome: &Genome, seed: u32) -> Result<String> {
        let cpfa = self.render_cpfa_chunk(genome)?;

        let mut doc = String::with_capacity(4096);
        doc.push_str("<?xml version=\"1.0\"?>\n<argos-configuration>\n");
        let _ = write!(
            doc,
            r#"<framework>
    <experiment ticks_per_second="{ticks}"
                random_seed="{seed}"/>
</framework>
<controllers>
    <iAnt_controller id="iAnt_c" library="{controller}">
        <actuators>
            <differential_steering implementation="default"/>
        </actuators>
        <sensors>
            <footbot_proximity implementation="default" show_rays="false"/>
            <positioning implementation="default"/>
            <footbot_motor_ground implementation="rot_z_only"/>
        </sensors>
        <params>
            <iAnt_params searchStepSize="0.175"
                         distanceTolerance="0.01"
                         robotForwardSpeed="16.0"
                         robotRotationSpeed="13.3"
                         angleToleranceInDegrees="15.0"/>
        </params>
    </iAnt_controller>
</controllers>
<loop_functions library="{loop_functions}" label="iAnt_loop_functions">
    {cpfa}
    <simulation MaxSimCounter="1"
                MaxSimTime="{length}"
                VariableSeed="1"
                OutputData="1"
                ResourceDensityDelay="4"
                DrawDensityRate="8"
                DrawTrails="1"
                DrawTargetRays="1"
                NestPosition="0.0, 0.0"
                NestRadius="0.25"
                NestElevation="0.01"
                FoodRadius="0.05"
                FoodDistribution="2"/>
    <_0_FoodDistribution_Random FoodItemCount="256"/>
    <_1_FoodDistribution_Cluster NumberOfClusters="4"
                                 ClusterWidthX="8"
                                 ClusterLengthY="8"/>
    <_2_FoodDistribution_PowerLaw PowerRank="5"/>
</loop_functions>
<arena size="20.0, 20.0, 1.0" center="0.0, 0.0, 0.0">
    <floor id="floor" source="loop_functions" pixels_per_meter="10"/>
    <distribute>
        <position method="grid"
                  center="0.0, 0.0, 0.0"
                  distances="0.2, 0.2, 0.0"
                  layout="3, 4, 1"/>
        <orientation method="constant" values="0.0, 0.0, 0.0"/>
        <entity quantity="{robots}" max_trials="500">
            <foot-bot id="fb_"><controller config="iAnt_c"/></foot-bot>
        </entity>
    </distribute>
</arena>
<physics_engines><dynamics2d id="dyn2d"/></physics_engines>
<media><led id="leds"/></media>
"#,
            ticks = TICKS_PER_SECOND,
            seed = seed,
            controller = self.platform.controller_library(),
            loop_functions = self.platform.loop_functions_library(),
            cpfa = cpfa,
            length = self.length,
            robots = self.robots,
        );
        doc.push_str("</argos-configuration>\n");
        Ok(doc)
    }
}
