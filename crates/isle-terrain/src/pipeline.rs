//! Ordered generation pipeline.
//!
//! Steps are stable-sorted by priority once, at construction. A run validates
//! every step up front (a bad configuration is fatal), then applies them in
//! order. A step that fails at run time is logged and skipped; the remaining
//! steps still run and the presenter is always flushed at the end.
//!
//! Generating again over the same world goes through [`Pipeline::rerun`],
//! which destroys the previous run's instances and clears the carved holes and
//! feature mask first, so a rerun matches a run on a fresh world.

use tracing::{error, info, warn};

use crate::collab::Collaborators;
use crate::error::{PipelineError, StepError};
use crate::heightfield::TerrainData;
use crate::layout::Layout;
use crate::steps::{GenerationStep, StepContext, StepReport};

/// What happened to one step during a run.
#[derive(Clone, Debug, PartialEq)]
pub enum StepStatus {
    Completed(StepReport),
    Skipped(StepError),
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome {
    pub name: &'static str,
    pub priority: i32,
    pub status: StepStatus,
}

impl StepOutcome {
    pub fn report(&self) -> Option<StepReport> {
        match &self.status {
            StepStatus::Completed(r) => Some(*r),
            StepStatus::Skipped(_) => None,
        }
    }
}

/// Result of a full run.
#[derive(Clone, Debug, Default)]
pub struct PipelineOutput {
    pub layout: Layout,
    pub outcomes: Vec<StepOutcome>,
}

impl PipelineOutput {
    pub fn skipped(&self) -> impl Iterator<Item = &StepOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, StepStatus::Skipped(_)))
    }

    pub fn outcome(&self, name: &str) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    steps: Vec<GenerationStep>,
}

impl Pipeline {
    pub fn new(mut steps: Vec<GenerationStep>) -> Self {
        // `sort_by_key` is stable: equal priorities keep their given order.
        steps.sort_by_key(GenerationStep::priority);
        Self { steps }
    }

    /// Every default step, in priority order.
    pub fn with_defaults() -> Self {
        Self::new(GenerationStep::defaults())
    }

    pub fn steps(&self) -> &[GenerationStep] {
        &self.steps
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        for step in &self.steps {
            step.validate()
                .map_err(|source| PipelineError::InvalidStep {
                    step: step.name(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Generate into a world no earlier run has populated.
    pub fn run(
        &self,
        terrain: &mut TerrainData,
        collab: &mut Collaborators<'_>,
        seed: u64,
    ) -> Result<PipelineOutput, PipelineError> {
        self.rerun(terrain, collab, &mut Layout::default(), seed)
    }

    /// Generate again over a world that `previous` was generated into.
    ///
    /// On an invalid configuration nothing is touched, `previous` included.
    pub fn rerun(
        &self,
        terrain: &mut TerrainData,
        collab: &mut Collaborators<'_>,
        previous: &mut Layout,
        seed: u64,
    ) -> Result<PipelineOutput, PipelineError> {
        self.validate()?;
        let destroyed = previous.destroy_instances(&mut *collab.instances);
        terrain.holes.fill(false);
        terrain.feature_mask.fill(0.0);
        info!(seed, steps = self.steps.len(), destroyed, "generation started");

        let mut layout = Layout::default();
        let mut outcomes = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            let mut ctx = StepContext {
                terrain: &mut *terrain,
                layout: &mut layout,
                collab: &mut *collab,
            };
            let status = match step.apply(&mut ctx, seed) {
                Ok(report) => {
                    if report.is_partial() {
                        warn!(
                            step = step.name(),
                            accepted = report.accepted,
                            requested = report.requested,
                            "step completed partially"
                        );
                    }
                    StepStatus::Completed(report)
                }
                Err(err) => {
                    error!(step = step.name(), error = %err, "step skipped");
                    StepStatus::Skipped(err)
                }
            };
            outcomes.push(StepOutcome {
                name: step.name(),
                priority: step.priority(),
                status,
            });
        }

        collab.presenter.flush(terrain, &layout);
        collab.presenter.sync_transforms();

        info!(
            seed,
            props = layout.props.len(),
            trees = layout.trees.len(),
            mobs = layout.mobs.len(),
            groups = layout.groups.len(),
            caves = layout.caves.len(),
            "generation finished"
        );
        Ok(PipelineOutput { layout, outcomes })
    }
}
