// Mon Jan 19 2026 - Alex

use crate::query::{AccumulatedResponse, Frame, FrameData, LogLine, PartialResponse, Series};

/// Additive merge of partial responses into the running result.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseAggregator;

impl ResponseAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn merge_into(&self, accumulated: &mut AccumulatedResponse, partial: PartialResponse) {
        for frame in partial.frames {
            match accumulated.frames.get_mut(&frame.ref_id) {
                Some(existing) => self.merge_frame(existing, frame),
                None => {
                    accumulated.frames.insert(frame.ref_id.clone(), frame);
                }
            }
        }
        accumulated.errors.extend(partial.errors);
    }

    fn merge_frame(&self, existing: &mut Frame, incoming: Frame) {
        match (&mut existing.data, incoming.data) {
            (FrameData::Logs(lines), FrameData::Logs(new_lines)) => {
                merge_lines(lines, new_lines);
            }
            (FrameData::Metrics(series), FrameData::Metrics(new_series)) => {
                merge_series(series, new_series);
            }
            _ => {
                log::warn!(
                    "Frame kind mismatch for {}; keeping the existing data",
                    existing.ref_id
                );
            }
        }
    }
}

/// Newest first, as the store returns them.
fn merge_lines(lines: &mut Vec<LogLine>, new_lines: Vec<LogLine>) {
    lines.extend(new_lines);
    lines.sort_by(|a, b| b.timestamp_ns.cmp(&a.timestamp_ns));
}

fn merge_series(series: &mut Vec<Series>, new_series: Vec<Series>) {
    for incoming in new_series {
        match series.iter_mut().find(|s| s.labels == incoming.labels) {
            Some(existing) => {
                existing.samples.extend(incoming.samples);
                existing.samples.sort_by_key(|s| s.timestamp_ms);
                existing.samples.dedup_by_key(|s| s.timestamp_ms);
            }
            None => series.push(incoming),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryError, Sample};
    use indexmap::IndexMap;

    fn labels(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_merge_new_frame() {
        let mut acc = AccumulatedResponse::new("op");
        let partial = PartialResponse::new(vec![Frame::logs("A", vec![LogLine::new(1, "a")])]);
        ResponseAggregator::new().merge_into(&mut acc, partial);
        assert_eq!(acc.line_count("A"), 1);
    }

    #[test]
    fn test_merge_logs_keeps_newest_first() {
        let aggregator = ResponseAggregator::new();
        let mut acc = AccumulatedResponse::new("op");
        aggregator.merge_into(
            &mut acc,
            PartialResponse::new(vec![Frame::logs("A", vec![LogLine::new(10, "b"), LogLine::new(5, "d")])]),
        );
        aggregator.merge_into(
            &mut acc,
            PartialResponse::new(vec![Frame::logs("A", vec![LogLine::new(20, "a"), LogLine::new(7, "c")])]),
        );

        let Some(FrameData::Logs(lines)) = acc.frame("A").map(|f| &f.data) else {
            panic!("expected a logs frame");
        };
        let order: Vec<&str> = lines.iter().map(|l| l.line.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_merge_series_by_labels() {
        let aggregator = ResponseAggregator::new();
        let mut acc = AccumulatedResponse::new("op");
        let first = Series {
            labels: labels(&[("app", "x")]),
            samples: vec![Sample { timestamp_ms: 2, value: 1.0 }],
        };
        let second = Series {
            labels: labels(&[("app", "x")]),
            samples: vec![Sample { timestamp_ms: 1, value: 4.0 }, Sample { timestamp_ms: 2, value: 9.0 }],
        };
        let other = Series {
            labels: labels(&[("app", "y")]),
            samples: vec![Sample { timestamp_ms: 1, value: 2.0 }],
        };

        aggregator.merge_into(&mut acc, PartialResponse::new(vec![Frame::metrics("M", vec![first])]));
        aggregator.merge_into(&mut acc, PartialResponse::new(vec![Frame::metrics("M", vec![second, other])]));

        let Some(FrameData::Metrics(series)) = acc.frame("M").map(|f| &f.data) else {
            panic!("expected a metrics frame");
        };
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].samples.len(), 2);
        assert_eq!(series[0].samples[0].timestamp_ms, 1);
        assert_eq!(series[0].samples[1].value, 1.0);
    }

    #[test]
    fn test_mismatched_kinds_keep_existing() {
        let aggregator = ResponseAggregator::new();
        let mut acc = AccumulatedResponse::new("op");
        aggregator.merge_into(&mut acc, PartialResponse::new(vec![Frame::logs("A", vec![LogLine::new(1, "a")])]));
        aggregator.merge_into(&mut acc, PartialResponse::new(vec![Frame::metrics("A", vec![])]));
        assert!(acc.frame("A").unwrap().is_logs());
        assert_eq!(acc.line_count("A"), 1);
    }

    #[test]
    fn test_errors_are_appended() {
        let mut acc = AccumulatedResponse::new("op");
        let partial = PartialResponse::new(vec![]).with_error(QueryError::new("limit"));
        ResponseAggregator::new().merge_into(&mut acc, partial);
        assert_eq!(acc.errors.len(), 1);
    }
}
