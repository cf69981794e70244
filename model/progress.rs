use crate::regression::TrainSummary;

/// Observer for reporting incremental progress while training over a dataset.
pub trait TrainProgressObserver {
    fn on_start(&mut self, total_examples: usize) {
        let _ = total_examples;
    }
    fn on_advance(&mut self, processed_examples: usize) {
        let _ = processed_examples;
    }
    fn on_finish(&mut self, summary: &TrainSummary) {
        let _ = summary;
    }
}

#[derive(Default)]
pub struct NoopTrainProgress;

impl TrainProgressObserver for NoopTrainProgress {}
