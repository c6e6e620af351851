use std::sync::Arc;

use dashmap::DashMap;

use crate::bot::events::Inbound;
use crate::db::models::UserField;
use crate::db::Database;

/// One prompt of the address questionnaire, in the order they are asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnboardingStep {
    Street,
    House,
    Flat,
    Entrance,
    Floor,
    Phone,
}

impl OnboardingStep {
    pub const FIRST: OnboardingStep = OnboardingStep::Street;

    pub fn next(self) -> Option<Self> {
        match self {
            Self::Street => Some(Self::House),
            Self::House => Some(Self::Flat),
            Self::Flat => Some(Self::Entrance),
            Self::Entrance => Some(Self::Floor),
            Self::Floor => Some(Self::Phone),
            Self::Phone => None,
        }
    }

    /// Column the answer to this step is stored in.
    pub fn field(self) -> UserField {
        match self {
            Self::Street => UserField::Street,
            Self::House => UserField::House,
            Self::Flat => UserField::Flat,
            Self::Entrance => UserField::Entrance,
            Self::Floor => UserField::Floor,
            Self::Phone => UserField::Phone,
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Self::Street => "🏠 Введите улицу:",
            Self::House => "Введите номер дома:",
            Self::Flat => "Введите номер квартиры:",
            Self::Entrance => "Введите подъезд:",
            Self::Floor => "Введите этаж:",
            Self::Phone => "Введите телефон:",
        }
    }
}

/// Current onboarding step per user. Volatile: a restart forgets every
/// pointer, answers already given stay in the database.
#[derive(Debug, Clone, Default)]
pub struct OnboardingSessions {
    steps: Arc<DashMap<i64, OnboardingStep>>,
}

impl OnboardingSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts the user at the first step, discarding any earlier progress.
    pub fn begin(&self, user_id: i64) {
        self.steps.insert(user_id, OnboardingStep::FIRST);
    }

    pub fn current(&self, user_id: i64) -> Option<OnboardingStep> {
        self.steps.get(&user_id).map(|step| *step)
    }

    fn set(&self, user_id: i64, step: OnboardingStep) {
        self.steps.insert(user_id, step);
    }

    pub fn finish(&self, user_id: i64) {
        self.steps.remove(&user_id);
    }

    pub fn clear(&self) {
        self.steps.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Not onboarding, or the message carried no text.
    Ignored,
    /// Answer stored; the user should now be asked for this step.
    Advanced(OnboardingStep),
    /// Last answer stored; the user has left the flow.
    Completed,
}

/// Stores a text answer for the user's current step and moves them on.
///
/// On a storage error the step pointer is left where it was, so the same
/// question can be answered again.
pub async fn handle_input(
    db: &Database,
    sessions: &OnboardingSessions,
    user_id: i64,
    inbound: &Inbound,
) -> anyhow::Result<StepOutcome> {
    let Some(text) = inbound.as_text() else {
        return Ok(StepOutcome::Ignored);
    };
    let Some(step) = sessions.current(user_id) else {
        return Ok(StepOutcome::Ignored);
    };

    db.save_user_info(user_id, &[(step.field(), text.trim())])
        .await?;

    match step.next() {
        Some(next) => {
            sessions.set(user_id, next);
            Ok(StepOutcome::Advanced(next))
        }
        None => {
            sessions.finish(user_id);
            Ok(StepOutcome::Completed)
        }
    }
}
