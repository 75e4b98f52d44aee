//! Submission planning and time parsing
//!
//! [`plan`] turns one submission into either an ordered list of immediate
//! publish steps or a list of timed entries to record for later dispatch.
//! Timing for deferred submissions follows a batch/interval/jitter model:
//! `batch_size` media items share a slot, the slot advances by `interval`
//! once a batch fills up, and each media item is nudged by a random offset
//! in `[-jitter, +jitter]` so posting never looks perfectly periodic.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use rand::Rng;

use crate::media::StoredMedia;
use crate::types::{MediaKind, Target};
use crate::{PagecastError, Result};

/// Deferred-mode timing parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    pub start_time: DateTime<Utc>,
    pub interval: Duration,
    /// Media items sharing one slot before the schedule advances
    pub batch_size: u32,
    pub jitter: Duration,
}

impl Timing {
    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PagecastError::InvalidInput(
                "Batch size must be at least 1".to_string(),
            ));
        }
        if self.interval < Duration::zero() {
            return Err(PagecastError::InvalidInput(
                "Interval cannot be negative".to_string(),
            ));
        }
        if self.jitter < Duration::zero() {
            return Err(PagecastError::InvalidInput(
                "Jitter cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// A stored media item and the kind it will be published as
#[derive(Debug, Clone)]
pub struct MediaItem {
    pub stored: StoredMedia,
    pub kind: MediaKind,
}

/// Everything the planner needs from a submission
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    pub message: Option<&'a str>,
    pub media: &'a [MediaItem],
    pub targets: &'a [Target],
    /// `None` publishes immediately
    pub timing: Option<&'a Timing>,
    /// Auto-delete retention; `None` keeps content forever
    pub retention: Option<Duration>,
}

/// One media item (or the text-only pass) fanned out to every target
#[derive(Debug, Clone, Copy)]
pub struct PublishStep<'a> {
    pub media: Option<&'a MediaItem>,
    pub targets: &'a [Target],
}

/// A timed (content, target) pair to record for later dispatch
#[derive(Debug, Clone, Copy)]
pub struct PlannedEntry<'a> {
    pub message: Option<&'a str>,
    pub media: Option<&'a MediaItem>,
    pub target: &'a Target,
    pub scheduled_time: DateTime<Utc>,
    pub delete_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub enum ExecutionPlan<'a> {
    /// Steps in order; the executor paces between steps, never within one
    Immediate(Vec<PublishStep<'a>>),
    Deferred(Vec<PlannedEntry<'a>>),
}

impl ExecutionPlan<'_> {
    /// Number of (content, target) pairs the plan covers
    pub fn pair_count(&self) -> usize {
        match self {
            ExecutionPlan::Immediate(steps) => steps.iter().map(|s| s.targets.len()).sum(),
            ExecutionPlan::Deferred(entries) => entries.len(),
        }
    }
}

/// Treat blank messages as absent
pub fn normalize_message(message: Option<&str>) -> Option<&str> {
    message.filter(|m| !m.trim().is_empty())
}

/// Reject submissions that can't produce a single publish
///
/// # Errors
///
/// Returns `PagecastError::InvalidInput` when no target is selected, when
/// there is neither a message nor media, or when the timing or retention
/// parameters are out of range.
pub fn validate_submission(
    message: Option<&str>,
    media_count: usize,
    target_count: usize,
    timing: Option<&Timing>,
    retention: Option<Duration>,
) -> Result<()> {
    if target_count == 0 {
        return Err(PagecastError::InvalidInput(
            "Please select at least one page".to_string(),
        ));
    }

    if normalize_message(message).is_none() && media_count == 0 {
        return Err(PagecastError::InvalidInput(
            "Please write a message or upload a file".to_string(),
        ));
    }

    if let Some(timing) = timing {
        timing.validate()?;
    }

    if let Some(retention) = retention {
        if retention <= Duration::zero() {
            return Err(PagecastError::InvalidInput(
                "Auto-delete retention must be positive".to_string(),
            ));
        }
    }

    Ok(())
}

/// Build the execution plan for a submission
///
/// # Errors
///
/// Returns the validation errors of [`validate_submission`]; planning itself
/// cannot fail.
pub fn plan<'a, R: Rng + ?Sized>(
    request: &PlanRequest<'a>,
    rng: &mut R,
) -> Result<ExecutionPlan<'a>> {
    validate_submission(
        request.message,
        request.media.len(),
        request.targets.len(),
        request.timing,
        request.retention,
    )?;

    let message = normalize_message(request.message);

    let Some(timing) = request.timing else {
        let steps = if request.media.is_empty() {
            vec![PublishStep {
                media: None,
                targets: request.targets,
            }]
        } else {
            request
                .media
                .iter()
                .map(|item| PublishStep {
                    media: Some(item),
                    targets: request.targets,
                })
                .collect()
        };
        return Ok(ExecutionPlan::Immediate(steps));
    };

    let mut entries = Vec::with_capacity(request.media.len().max(1) * request.targets.len());

    if request.media.is_empty() {
        let delete_time = request
            .retention
            .map(|r| shift(timing.start_time, r, "Auto-delete time"))
            .transpose()?;
        for target in request.targets {
            entries.push(PlannedEntry {
                message,
                media: None,
                target,
                scheduled_time: timing.start_time,
                delete_time,
            });
        }
        return Ok(ExecutionPlan::Deferred(entries));
    }

    let mut current_time = timing.start_time;
    let mut batch_counter: u32 = 0;

    for item in request.media {
        batch_counter += 1;

        let offset = jitter_offset(timing.jitter, rng);
        let effective_time = shift(current_time, offset, "Scheduled time")?;
        let delete_time = request
            .retention
            .map(|r| shift(effective_time, r, "Auto-delete time"))
            .transpose()?;

        for target in request.targets {
            entries.push(PlannedEntry {
                message,
                media: Some(item),
                target,
                scheduled_time: effective_time,
                delete_time,
            });
        }

        if batch_counter >= timing.batch_size {
            current_time = shift(current_time, timing.interval, "Scheduled time")?;
            batch_counter = 0;
        }
    }

    Ok(ExecutionPlan::Deferred(entries))
}

/// `time + offset`, or `InvalidInput` when the result can't be represented
fn shift(time: DateTime<Utc>, offset: Duration, what: &str) -> Result<DateTime<Utc>> {
    time.checked_add_signed(offset).ok_or_else(|| {
        PagecastError::InvalidInput(format!("{} out of range: {} + {}", what, time, offset))
    })
}

/// Uniform offset in `[-jitter, +jitter]`, whole seconds
pub fn jitter_offset<R: Rng + ?Sized>(jitter: Duration, rng: &mut R) -> Duration {
    let bound = jitter.num_seconds();
    if bound <= 0 {
        return Duration::zero();
    }
    Duration::seconds(rng.gen_range(-bound..=bound))
}

/// Random pause between immediate publish steps
pub fn pacing_delay<R: Rng + ?Sized>(min_secs: u64, max_secs: u64, rng: &mut R) -> std::time::Duration {
    let (low, high) = if min_secs <= max_secs {
        (min_secs, max_secs)
    } else {
        (max_secs, min_secs)
    };
    std::time::Duration::from_secs(rng.gen_range(low..=high))
}

// ============================================================================
// Time Parsing
// ============================================================================

/// Parse a start time
///
/// Supports:
/// - RFC 3339 / ISO-8601: "2025-11-20T15:00:00Z", "2025-11-20T15:00:00+06:00"
/// - Naive timestamps read as UTC: "2025-11-20 15:00", "2025-11-20T15:00:00"
/// - Relative durations from `now`: "30m", "+2h", "in 1 day"
/// - Natural language: "tomorrow 10am", "next monday 9:30"
///
/// # Errors
///
/// Returns `PagecastError::InvalidInput` if the input is empty or matches
/// none of the formats.
pub fn parse_start_time(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PagecastError::InvalidInput(
            "Start time cannot be empty".to_string(),
        ));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    let relative = input
        .strip_prefix('+')
        .or_else(|| input.strip_prefix("in "))
        .unwrap_or(input)
        .trim();
    if let Ok(duration) = parse_duration(relative) {
        return shift(now, duration, "Start time");
    }

    chrono_english::parse_date_string(input, now, chrono_english::Dialect::Us).map_err(|e| {
        PagecastError::InvalidInput(format!("Could not parse start time '{}': {}", input, e))
    })
}

/// Parse a duration such as "30m", "1h 30m" or "2 days"
///
/// A bare number is read as minutes.
///
/// # Errors
///
/// Returns `PagecastError::InvalidInput` if the input isn't a duration.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();

    if let Ok(minutes) = input.parse::<i64>() {
        return Duration::try_minutes(minutes)
            .ok_or_else(|| PagecastError::InvalidInput("Duration out of range".to_string()));
    }

    let std_duration = humantime::parse_duration(input).map_err(|e| {
        PagecastError::InvalidInput(format!("Could not parse duration '{}': {}", input, e))
    })?;

    Duration::from_std(std_duration)
        .map_err(|_| PagecastError::InvalidInput("Duration out of range".to_string()))
}
