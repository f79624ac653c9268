//! Time-based vesting.
//!
//! A schedule is cut into periods of 1, 3 or 12 months starting at `start`;
//! the last boundary is clamped to `start + duration_months`. Nothing vests
//! before the cliff, everything up to the cliff vests on the cliff date, and
//! afterwards `floor(quantity × completed / total)` has vested. The final
//! boundary releases the exact remainder, so increments sum to the grant.

use serde::{Deserialize, Serialize};

use crate::domain::mul_div_floor;
use crate::{
    ArithmeticError, BasisPoints, CalendarDate, ConservationViolation, EngineError,
    ValidationError, VestingFrequency,
};

/// Event that makes acceleration effective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccelerationTrigger {
    SingleTrigger {
        change_of_control_on: CalendarDate,
    },
    /// Requires both events; effective on the later one.
    DoubleTrigger {
        change_of_control_on: CalendarDate,
        terminated_on: CalendarDate,
    },
}

impl AccelerationTrigger {
    pub fn effective_on(&self) -> CalendarDate {
        match *self {
            Self::SingleTrigger {
                change_of_control_on,
            } => change_of_control_on,
            Self::DoubleTrigger {
                change_of_control_on,
                terminated_on,
            } => change_of_control_on.max(terminated_on),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acceleration {
    pub trigger: AccelerationTrigger,
    pub percentage_accelerated_bps: BasisPoints,
}

impl Acceleration {
    fn is_effective(&self, as_of: CalendarDate) -> bool {
        self.trigger.effective_on() <= as_of
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingSchedule {
    pub start: CalendarDate,
    #[serde(default)]
    pub cliff_months: u32,
    pub duration_months: u32,
    pub frequency: VestingFrequency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceleration: Option<Acceleration>,
}

impl VestingSchedule {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.duration_months <= self.cliff_months {
            return Err(ValidationError::DurationNotAfterCliff {
                cliff_months: self.cliff_months,
                duration_months: self.duration_months,
            });
        }
        if let Some(acceleration) = &self.acceleration {
            acceleration
                .percentage_accelerated_bps
                .ensure_at_most_whole("percentage_accelerated_bps")?;
        }
        Ok(())
    }

    pub fn total_periods(&self) -> u32 {
        self.duration_months
            .div_ceil(self.frequency.period_months())
    }

    pub fn cliff_date(&self) -> Result<CalendarDate, ValidationError> {
        self.start.add_months(self.cliff_months)
    }

    pub fn end_date(&self) -> Result<CalendarDate, ValidationError> {
        self.start.add_months(self.duration_months)
    }

    /// Boundary `period` (1-based); the last one lands on the end date.
    pub fn boundary(&self, period: u32) -> Result<CalendarDate, ValidationError> {
        let months = period
            .saturating_mul(self.frequency.period_months())
            .min(self.duration_months);
        self.start.add_months(months)
    }

    fn completed_periods(&self, as_of: CalendarDate) -> Result<u32, ValidationError> {
        let mut completed = 0;
        for period in 1..=self.total_periods() {
            if self.boundary(period)? > as_of {
                break;
            }
            completed = period;
        }
        Ok(completed)
    }

    /// Dates on which the vested amount can increase, in order.
    fn event_dates(&self) -> Result<Vec<CalendarDate>, ValidationError> {
        let cliff = self.cliff_date()?;
        let mut dates = (1..=self.total_periods())
            .map(|period| self.boundary(period).map(|date| date.max(cliff)))
            .collect::<Result<Vec<_>, _>>()?;
        dates.dedup();
        Ok(dates)
    }
}

/// A quantity of shares vesting on one schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub quantity: u64,
    pub schedule: VestingSchedule,
    /// Informational; vesting runs from `schedule.start`.
    pub grant_date: CalendarDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VestingEvent {
    pub date: CalendarDate,
    pub increment: u64,
    pub cumulative: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VestingSummary {
    pub quantity: u64,
    pub as_of: CalendarDate,
    pub vested: u64,
    pub unvested: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_vesting_date: Option<CalendarDate>,
    pub accelerated: bool,
}

impl Grant {
    pub fn vested_as_of(&self, as_of: CalendarDate) -> Result<u64, EngineError> {
        compute_vested(self.quantity, &self.schedule, as_of)
    }

    pub fn unvested_as_of(&self, as_of: CalendarDate) -> Result<u64, EngineError> {
        compute_unvested(self.quantity, &self.schedule, as_of)
    }

    /// Like [`next_vesting_date`], but also `None` once partial acceleration
    /// has vested the whole grant.
    pub fn next_vesting_date(&self, as_of: CalendarDate) -> Result<Option<CalendarDate>, EngineError> {
        if self.vested_as_of(as_of)? == self.quantity {
            return Ok(None);
        }
        next_vesting_date(&self.schedule, as_of)
    }

    pub fn events(&self) -> Result<Vec<VestingEvent>, EngineError> {
        vesting_events(self.quantity, &self.schedule)
    }

    pub fn summary(&self, as_of: CalendarDate) -> Result<VestingSummary, EngineError> {
        let vested = self.vested_as_of(as_of)?;
        Ok(VestingSummary {
            quantity: self.quantity,
            as_of,
            vested,
            unvested: self.quantity - vested,
            next_vesting_date: self.next_vesting_date(as_of)?,
            accelerated: self
                .schedule
                .acceleration
                .is_some_and(|acceleration| acceleration.is_effective(as_of)),
        })
    }
}

/// Shares vested on `as_of`, including any effective acceleration.
pub fn compute_vested(
    quantity: u64,
    schedule: &VestingSchedule,
    as_of: CalendarDate,
) -> Result<u64, EngineError> {
    schedule.validate()?;
    let scheduled = scheduled_vested(quantity, schedule, as_of)?;

    let Some(acceleration) = schedule.acceleration.filter(|a| a.is_effective(as_of)) else {
        return Ok(scheduled);
    };

    let accelerated = acceleration
        .percentage_accelerated_bps
        .apply_floor(u128::from(quantity))?;
    let vested = (u128::from(scheduled) + accelerated).min(u128::from(quantity));
    tracing::trace!(
        scheduled,
        accelerated = %accelerated,
        "applied vesting acceleration"
    );
    u64::try_from(vested).map_err(|_| {
        ArithmeticError::Overflow {
            context: "accelerated vesting",
        }
        .into()
    })
}

pub fn compute_unvested(
    quantity: u64,
    schedule: &VestingSchedule,
    as_of: CalendarDate,
) -> Result<u64, EngineError> {
    Ok(quantity - compute_vested(quantity, schedule, as_of)?)
}

/// First vesting event strictly after `as_of`; `None` after the last event or
/// under an effective 100% acceleration.
///
/// Partial acceleration is ignored here since the grant quantity is unknown;
/// use [`Grant::next_vesting_date`] when the accelerated shares may already
/// cover the remainder.
pub fn next_vesting_date(
    schedule: &VestingSchedule,
    as_of: CalendarDate,
) -> Result<Option<CalendarDate>, EngineError> {
    schedule.validate()?;

    let fully_accelerated = schedule.acceleration.is_some_and(|acceleration| {
        acceleration.is_effective(as_of)
            && acceleration.percentage_accelerated_bps.get() >= BasisPoints::ONE_HUNDRED_PERCENT
    });
    if fully_accelerated {
        return Ok(None);
    }

    Ok(schedule
        .event_dates()?
        .into_iter()
        .find(|date| *date > as_of))
}

/// Every scheduled vesting event with its increment. Acceleration is not
/// applied; increments always sum to `quantity`.
pub fn vesting_events(
    quantity: u64,
    schedule: &VestingSchedule,
) -> Result<Vec<VestingEvent>, EngineError> {
    schedule.validate()?;

    let mut events = Vec::new();
    let mut cumulative = 0u64;
    for date in schedule.event_dates()? {
        let vested = scheduled_vested(quantity, schedule, date)?;
        events.push(VestingEvent {
            date,
            increment: vested - cumulative,
            cumulative: vested,
        });
        cumulative = vested;
    }

    let total: u64 = events.iter().map(|event| event.increment).sum();
    if total != quantity {
        return Err(ConservationViolation::Vesting {
            expected: quantity,
            actual: total,
        }
        .into());
    }

    Ok(events)
}

fn scheduled_vested(
    quantity: u64,
    schedule: &VestingSchedule,
    as_of: CalendarDate,
) -> Result<u64, EngineError> {
    if as_of < schedule.cliff_date()? {
        return Ok(0);
    }

    let total = schedule.total_periods();
    let completed = schedule.completed_periods(as_of)?;
    if completed >= total {
        return Ok(quantity);
    }

    let context = "scheduled vesting";
    let vested = mul_div_floor(
        u128::from(quantity),
        u128::from(completed),
        u128::from(total),
        context,
    )?;
    Ok(u64::try_from(vested).map_err(|_| ArithmeticError::Overflow { context })?)
}
