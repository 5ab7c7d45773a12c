use crate::scheduler::request::JobRequest;

/// Order a polled batch for dispatch: descending by priority weight.
///
/// The sort must be stable — requests of equal weight keep their arrival
/// order. This is a correctness requirement, not an optimization: within a
/// priority class the backlog's delivery order is the dispatch order.
///
/// Note this orders only the current batch. There is no cross-batch priority
/// queue and no aging, so sustained high-priority load can starve
/// low-priority requests.
pub fn order(mut requests: Vec<JobRequest>) -> Vec<JobRequest> {
    requests.sort_by_key(|r| std::cmp::Reverse(r.priority.weight()));
    requests
}
