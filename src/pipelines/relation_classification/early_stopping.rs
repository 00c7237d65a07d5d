/// Stop training once the dev loss has risen too many times
///
/// A trigger is counted for the first evaluation and for every evaluation whose loss is
/// higher than the previous one. Triggers are never reset.
#[derive(Clone, Debug, Default)]
pub struct EarlyStopping {
    patience: usize,
    triggers: usize,
    last_loss: Option<f64>,
}

impl EarlyStopping {
    /// Create a new tracker; a patience of 0 never stops
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            ..Default::default()
        }
    }

    /// Record a dev loss, returning true when training should stop
    pub fn update(&mut self, loss: f64) -> bool {
        if self.last_loss.map_or(true, |last| loss > last) {
            self.triggers += 1;
        }

        self.last_loss = Some(loss);

        self.should_stop()
    }

    /// True once the trigger count reached the patience
    pub fn should_stop(&self) -> bool {
        self.patience > 0 && self.triggers >= self.patience
    }

    /// Triggers counted so far
    pub fn triggers(&self) -> usize {
        self.triggers
    }

    /// The configured patience
    pub fn patience(&self) -> usize {
        self.patience
    }
}
