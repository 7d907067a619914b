pub mod dashboard;

// The terminal UI is a single screen: health gauge, pod/service counters,
// the four node series as charts, and the two top-pods tables.

pub use dashboard::Dashboard;
