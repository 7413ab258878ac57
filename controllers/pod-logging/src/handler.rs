//! Pod event logging callbacks.
//!
//! The callbacks do nothing besides writing log lines describing the pod.

use crate::informer::ResourceEventHandler;
use k8s_openapi::api::core::v1::Pod;
use std::collections::BTreeMap;
use tracing::info;

/// Logs the name, namespace, labels and phase of pods as they change.
#[derive(Debug, Clone, Copy, Default)]
pub struct PodEventLogger;

impl PodEventLogger {
    fn pod_add(&self, pod: &Pod) {
        let empty = BTreeMap::new();
        let labels = pod.metadata.labels.as_ref().unwrap_or(&empty);
        info!("POD CREATED: {}/{}/{:?}", namespace(pod), name(pod), labels);
        let label_str = label_str_from_label_map(labels);
        info!("pod label string: {}", label_str);
    }

    fn pod_update(&self, old: &Pod, new: &Pod) {
        info!("POD UPDATED. {}/{} {}", namespace(old), name(old), phase(new));
    }

    fn pod_delete(&self, pod: &Pod) {
        info!("POD DELETED: {}/{}", namespace(pod), name(pod));
    }
}

impl ResourceEventHandler<Pod> for PodEventLogger {
    fn on_add(&self, pod: &Pod, _is_in_initial_list: bool) {
        self.pod_add(pod);
    }

    fn on_update(&self, old: &Pod, new: &Pod) {
        self.pod_update(old, new);
    }

    fn on_delete(&self, pod: &Pod) {
        self.pod_delete(pod);
    }
}

fn namespace(pod: &Pod) -> &str {
    pod.metadata.namespace.as_deref().unwrap_or_default()
}

fn name(pod: &Pod) -> &str {
    pod.metadata.name.as_deref().unwrap_or_default()
}

fn phase(pod: &Pod) -> &str {
    pod.status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        .unwrap_or_default()
}

/// Renders a label map as comma-separated `key=value` pairs.
pub fn label_str_from_label_map(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::informer::tests::create_test_pod;
    use k8s_openapi::api::core::v1::PodStatus;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// In-memory sink for formatted log output
    #[derive(Clone, Default)]
    pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }

        /// Subscriber writing plain-text INFO output into this buffer
        pub(crate) fn into_subscriber(self) -> impl tracing::Subscriber + Send + Sync {
            tracing_subscriber::fmt()
                .with_writer(move || self.clone())
                .with_ansi(false)
                .with_max_level(tracing::Level::INFO)
                .finish()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(f: impl FnOnce()) -> String {
        let logs = CapturedLogs::default();
        tracing::subscriber::with_default(logs.clone().into_subscriber(), f);
        logs.contents()
    }

    #[test]
    fn test_label_str_empty_map() {
        assert_eq!(label_str_from_label_map(&BTreeMap::new()), "");
    }

    #[test]
    fn test_label_str_two_labels() {
        let labels = BTreeMap::from([
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ]);
        let label_str = label_str_from_label_map(&labels);

        let mut pairs: Vec<&str> = label_str.split(',').collect();
        pairs.sort_unstable();
        assert_eq!(pairs, vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_label_str_single_label_has_no_separator() {
        let labels = BTreeMap::from([("app".to_string(), "web".to_string())]);
        assert_eq!(label_str_from_label_map(&labels), "app=web");
    }

    #[test]
    fn test_add_logs_namespace_name_and_labels() {
        let mut pod = create_test_pod("default", "nginx", "1");
        pod.metadata.labels = Some(BTreeMap::from([("app".to_string(), "nginx".to_string())]));

        let logs = capture(|| PodEventLogger.on_add(&pod, false));

        assert!(logs.contains("POD CREATED: default/nginx/"), "logs: {logs}");
        assert!(logs.contains("pod label string: app=nginx"), "logs: {logs}");
    }

    #[test]
    fn test_add_without_labels_logs_empty_label_string() {
        let pod = create_test_pod("kube-system", "coredns", "1");

        let logs = capture(|| PodEventLogger.on_add(&pod, true));

        assert!(logs.contains("POD CREATED: kube-system/coredns/{}"), "logs: {logs}");
    }

    #[test]
    fn test_update_logs_old_name_and_new_phase() {
        let old = create_test_pod("default", "nginx", "1");
        let mut new = create_test_pod("default", "nginx", "2");
        new.status = Some(PodStatus {
            phase: Some("Running".to_string()),
            ..Default::default()
        });

        let logs = capture(|| PodEventLogger.on_update(&old, &new));

        assert!(logs.contains("POD UPDATED. default/nginx Running"), "logs: {logs}");
    }

    #[test]
    fn test_delete_logs_namespace_and_name() {
        let pod = create_test_pod("staging", "worker-0", "7");

        let logs = capture(|| PodEventLogger.on_delete(&pod));

        assert!(logs.contains("POD DELETED: staging/worker-0"), "logs: {logs}");
    }
}
