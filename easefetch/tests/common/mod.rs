#![allow(dead_code)]

use easefetch::mock::SnapshotRecorder;
use easefetch::FetchState;

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub test1: String,
    pub test2: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    pub test3: String,
}

pub fn record() -> Record {
    Record {
        test1: "data1".to_string(),
        test2: "data2".to_string(),
    }
}

pub fn summarize(record: Record) -> Summary {
    Summary {
        test3: record.test1,
    }
}

/// Collects the next `count` states, failing the test if any is missing.
pub async fn next_states<P: Clone + Send + Sync + 'static>(
    recorder: &mut SnapshotRecorder<P>,
    count: usize,
) -> Vec<FetchState<P>> {
    let mut states = Vec::with_capacity(count);
    for index in 0..count {
        match recorder.next().await {
            Some(snapshot) => states.push(snapshot.state),
            None => panic!("snapshot {index} of {count} never arrived"),
        }
    }
    states
}
