//! Behaviour suites for the SoftAP daemon.
