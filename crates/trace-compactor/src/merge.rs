use std::collections::VecDeque;

use trace_types::Trace;

/// K-way merges already trace-id-sorted inputs into one ascending, fully
/// deduplicated run (spec.md §4.4 step 2): "When two or more inputs produce
/// rows with the same trace-id, combine their `ResourceSpans` lists,
/// recompute trace-level derived fields ... and emit one output row."
pub fn merge_sorted_traces(inputs: Vec<Vec<Trace>>) -> Vec<Trace> {
    let mut queues: Vec<VecDeque<Trace>> = inputs.into_iter().map(VecDeque::from).collect();
    let mut out: Vec<Trace> = Vec::new();

    loop {
        let mut min_idx = None;
        for (i, q) in queues.iter().enumerate() {
            if let Some(front) = q.front() {
                let is_smaller = match min_idx {
                    None => true,
                    Some(j) => front.trace_id < queues[j].front().unwrap().trace_id,
                };
                if is_smaller {
                    min_idx = Some(i);
                }
            }
        }
        let Some(idx) = min_idx else { break };
        let trace = queues[idx].pop_front().expect("front() just confirmed non-empty");

        match out.last_mut() {
            Some(last) if last.trace_id == trace.trace_id => {
                last.merge_from(trace);
                last.recompute_derived_fields();
            }
            _ => out.push(trace),
        }
    }

    out
}
