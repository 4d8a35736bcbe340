//! Four-step wizard: acquire a photo, collect details, generate, show the poster.
//!
//! The step is a tagged union so the payload each step needs travels with it:
//! `Generating` and `ShowResult` can only be built from a validated
//! [`GenerationRequest`], which in turn requires an image and an alias.

use std::fmt;
use std::mem;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::image::EncodedImage;
use crate::session::HeroDetails;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Step {
    AcquireImage,
    CollectDetails,
    Generating,
    ShowResult,
}

impl Step {
    pub fn label(self) -> &'static str {
        match self {
            Step::AcquireImage => "Scan",
            Step::CollectDetails => "Identity",
            Step::Generating => "Generating",
            Step::ShowResult => "Premiere",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WizardError {
    #[error("hero alias must not be empty")]
    EmptyAlias,
    #[error("cannot {action} while in step {step}")]
    InvalidTransition { step: Step, action: &'static str },
}

/// Frozen payload for one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    image: EncodedImage,
    details: HeroDetails,
}

impl GenerationRequest {
    pub fn new(image: EncodedImage, details: HeroDetails) -> Result<Self, WizardError> {
        if !details.has_alias() {
            return Err(WizardError::EmptyAlias);
        }
        Ok(Self { image, details })
    }

    pub fn image(&self) -> &EncodedImage {
        &self.image
    }

    pub fn details(&self) -> &HeroDetails {
        &self.details
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardState {
    AcquireImage {
        image: Option<EncodedImage>,
    },
    CollectDetails {
        image: EncodedImage,
    },
    Generating {
        request: GenerationRequest,
    },
    ShowResult {
        request: GenerationRequest,
        generated: EncodedImage,
    },
}

impl WizardState {
    pub fn step(&self) -> Step {
        match self {
            WizardState::AcquireImage { .. } => Step::AcquireImage,
            WizardState::CollectDetails { .. } => Step::CollectDetails,
            WizardState::Generating { .. } => Step::Generating,
            WizardState::ShowResult { .. } => Step::ShowResult,
        }
    }
}

impl Default for WizardState {
    fn default() -> Self {
        WizardState::AcquireImage { image: None }
    }
}

/// The single mutable record for one user interaction.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    state: WizardState,
    details: HeroDetails,
    last_error: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: format!("session-{}", Uuid::new_v4().simple()),
            state: WizardState::default(),
            details: HeroDetails::default(),
            last_error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn step(&self) -> Step {
        self.state.step()
    }

    pub fn details(&self) -> &HeroDetails {
        &self.details
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn image(&self) -> Option<&EncodedImage> {
        match &self.state {
            WizardState::AcquireImage { image } => image.as_ref(),
            WizardState::CollectDetails { image } => Some(image),
            WizardState::Generating { request } | WizardState::ShowResult { request, .. } => {
                Some(request.image())
            }
        }
    }

    pub fn generated(&self) -> Option<&EncodedImage> {
        match &self.state {
            WizardState::ShowResult { generated, .. } => Some(generated),
            _ => None,
        }
    }

    /// Request currently in flight, if any.
    pub fn pending_request(&self) -> Option<&GenerationRequest> {
        match &self.state {
            WizardState::Generating { request } => Some(request),
            _ => None,
        }
    }

    pub fn image_acquired(&mut self, image: EncodedImage) -> Result<(), WizardError> {
        self.require_step(Step::AcquireImage, "accept an image")?;
        self.state = WizardState::CollectDetails { image };
        Ok(())
    }

    pub fn submit(&mut self, details: HeroDetails) -> Result<GenerationRequest, WizardError> {
        let WizardState::CollectDetails { image } = &self.state else {
            return Err(self.invalid("submit details"));
        };
        let request = GenerationRequest::new(image.clone(), details.clone())?;
        self.details = details;
        self.last_error = None;
        self.state = WizardState::Generating {
            request: request.clone(),
        };
        Ok(request)
    }

    pub fn regenerate(&mut self) -> Result<GenerationRequest, WizardError> {
        let WizardState::ShowResult { request, .. } = &self.state else {
            return Err(self.invalid("regenerate"));
        };
        let request = request.clone();
        self.last_error = None;
        self.state = WizardState::Generating {
            request: request.clone(),
        };
        Ok(request)
    }

    pub fn generation_succeeded(&mut self, generated: EncodedImage) -> Result<(), WizardError> {
        let request = self.take_pending("accept a generated image")?;
        self.state = WizardState::ShowResult { request, generated };
        Ok(())
    }

    /// Returns to the details screen with every input intact.
    pub fn generation_failed(&mut self, message: impl Into<String>) -> Result<(), WizardError> {
        let request = self.take_pending("record a generation failure")?;
        self.details = request.details;
        self.last_error = Some(message.into());
        self.state = WizardState::CollectDetails {
            image: request.image,
        };
        Ok(())
    }

    pub fn back(&mut self) -> Result<(), WizardError> {
        match mem::take(&mut self.state) {
            WizardState::CollectDetails { image } => {
                self.state = WizardState::AcquireImage { image: Some(image) };
                Ok(())
            }
            other => {
                self.state = other;
                Err(self.invalid("go back"))
            }
        }
    }

    pub fn reset(&mut self) -> Result<(), WizardError> {
        self.require_step(Step::ShowResult, "start over")?;
        self.state = WizardState::default();
        self.details = HeroDetails::default();
        self.last_error = None;
        Ok(())
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// Moves the in-flight request out; any other state is put back untouched.
    fn take_pending(&mut self, action: &'static str) -> Result<GenerationRequest, WizardError> {
        match mem::take(&mut self.state) {
            WizardState::Generating { request } => Ok(request),
            other => {
                self.state = other;
                Err(self.invalid(action))
            }
        }
    }

    fn require_step(&self, step: Step, action: &'static str) -> Result<(), WizardError> {
        if self.step() == step {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &'static str) -> WizardError {
        WizardError::InvalidTransition {
            step: self.step(),
            action,
        }
    }
}
