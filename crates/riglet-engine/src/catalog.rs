//! Built-in workload catalog

use riglet_core::WorkloadSpec;

/// Workloads the stock miner daemon ships implementations for
///
/// The daemon's implementations are CUDA builds; multi-name entries are
/// dual configurations running both algorithms on one worker.
pub fn default_catalog() -> Vec<WorkloadSpec> {
    vec![
        WorkloadSpec::cuda(&["equihash"]),
        WorkloadSpec::cuda(&["neoscrypt"]),
        WorkloadSpec::cuda(&["daggerhashimoto"]),
        WorkloadSpec::cuda(&["lyra2rev2"]),
        WorkloadSpec::cuda(&["daggerhashimoto", "decred"]),
        WorkloadSpec::cuda(&["daggerhashimoto", "pascal"]),
    ]
}
