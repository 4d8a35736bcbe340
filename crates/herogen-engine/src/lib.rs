pub mod acquire;
pub mod camera;
pub mod config;
pub mod gemini;
pub mod poster;
pub mod prompt;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use herogen_contracts::events::{EventLog, WizardEvent};
use herogen_contracts::image::EncodedImage;
use herogen_contracts::session::HeroDetails;
use herogen_contracts::wizard::{GenerationRequest, Session, Step, WizardError};
use tracing::{error, info, warn};

use crate::acquire::{AcquisitionError, ImageSource};
use crate::gemini::GenerationClient;

/// Message shown on the details screen after any non-configuration failure.
pub const GENERATION_RETRY_MESSAGE: &str =
    "Failed to generate scene. Please try again. Make sure your API key is valid.";

/// Drives one wizard session: every client result flows back into the state
/// machine here, and nothing the client raises escapes past this point.
pub struct HeroEngine {
    session: Session,
    events: EventLog,
    client: Box<dyn GenerationClient>,
}

impl HeroEngine {
    pub fn new(client: Box<dyn GenerationClient>, events_path: Option<PathBuf>) -> Result<Self> {
        let session = Session::new();
        let mut events = match events_path {
            Some(path) => EventLog::open(path, session.id())?,
            None => EventLog::disabled(session.id()),
        };
        events.record(&WizardEvent::SessionStarted {
            client: client.name().to_string(),
        })?;
        Ok(Self {
            session,
            events,
            client,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn step(&self) -> Step {
        self.session.step()
    }

    pub fn event_log_path(&self) -> Option<&Path> {
        self.events.path()
    }

    /// Runs a producer. `Ok(false)` means nothing was chosen; acquisition
    /// errors leave the session on the acquire step.
    pub fn acquire(&mut self, source: &mut dyn ImageSource) -> Result<bool, AcquisitionError> {
        if self.session.step() != Step::AcquireImage {
            return Err(AcquisitionError::Unsupported(format!(
                "a photo can only be chosen in step {}",
                Step::AcquireImage
            )));
        }
        match source.acquire() {
            Ok(Some(image)) => {
                self.accept_image(source.name(), image);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(err) => {
                warn!(target: "wizard", source = source.name(), error = %err, "photo acquisition failed");
                self.emit(WizardEvent::AcquisitionFailed {
                    source: source.name().to_string(),
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn accept_image(&mut self, source: &str, image: EncodedImage) {
        let mime = image.mime_type().to_string();
        if let Err(err) = self.session.image_acquired(image) {
            // Step was checked by the caller.
            error!(target: "wizard", error = %err, "image rejected by session");
            return;
        }
        info!(target: "wizard", source, mime = %mime, "photo accepted");
        self.emit(WizardEvent::ImageAcquired {
            source: source.to_string(),
            mime_type: mime,
        });
    }

    /// Submits the details form and waits for the single generation round trip.
    pub fn submit_details(&mut self, details: HeroDetails) -> Result<Step, WizardError> {
        let request = self.session.submit(details)?;
        Ok(self.run_generation(request))
    }

    pub fn regenerate(&mut self) -> Result<Step, WizardError> {
        let request = self.session.regenerate()?;
        Ok(self.run_generation(request))
    }

    fn run_generation(&mut self, request: GenerationRequest) -> Step {
        let details = request.details();
        self.emit(WizardEvent::GenerationStarted {
            client: self.client.name().to_string(),
            hero_name: details.hero_name.clone(),
            gender: details.gender,
            theme: details.theme.clone(),
        });

        let outcome = self.client.generate(&request);
        let transition = match outcome {
            Ok(image) => {
                info!(target: "wizard", mime = image.mime_type(), "scene generated");
                self.emit(WizardEvent::GenerationSucceeded {
                    mime_type: image.mime_type().to_string(),
                });
                self.session.generation_succeeded(image)
            }
            Err(err) => {
                error!(target: "wizard", error = %err, "scene generation failed");
                let message = if err.is_configuration() {
                    err.to_string()
                } else {
                    GENERATION_RETRY_MESSAGE.to_string()
                };
                self.emit(WizardEvent::GenerationFailed {
                    error: err.to_string(),
                    configuration: err.is_configuration(),
                });
                self.session.generation_failed(message)
            }
        };
        if let Err(err) = transition {
            error!(target: "wizard", error = %err, "generation result arrived outside Generating");
        }
        self.session.step()
    }

    pub fn back(&mut self) -> Result<(), WizardError> {
        self.session.back()?;
        self.emit(WizardEvent::NavigatedBack);
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), WizardError> {
        self.session.reset()?;
        info!(target: "wizard", "session reset");
        self.emit(WizardEvent::SessionReset);
        Ok(())
    }

    pub fn dismiss_error(&mut self) {
        self.session.dismiss_error();
    }

    /// Writes the generated poster into `dir`.
    pub fn save_poster(&mut self, dir: &Path) -> Result<PathBuf> {
        let Some(generated) = self.session.generated() else {
            bail!("no poster to save yet (step {})", self.session.step());
        };
        let path = poster::write_poster(dir, &self.session.details().hero_name, generated)?;
        info!(target: "wizard", path = %path.display(), "poster saved");
        self.emit(WizardEvent::PosterSaved {
            path: path.to_string_lossy().into_owned(),
        });
        Ok(path)
    }

    // The event log is an audit trail; a failed write must not break the wizard.
    fn emit(&mut self, event: WizardEvent) {
        if let Err(err) = self.events.record(&event) {
            warn!(target: "wizard", event = event.kind(), error = %err, "event write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::fs;
    use std::rc::Rc;

    use herogen_contracts::image::EncodedImage;
    use herogen_contracts::session::{Gender, HeroDetails};
    use herogen_contracts::wizard::{GenerationRequest, Step, WizardError};
    use serde_json::Value;

    use super::{HeroEngine, GENERATION_RETRY_MESSAGE};
    use crate::acquire::{AcquisitionError, ImageSource};
    use crate::gemini::{GenerationClient, GenerationError};

    type Script = Rc<RefCell<VecDeque<Result<EncodedImage, GenerationError>>>>;

    struct ScriptedClient {
        script: Script,
        calls: Rc<RefCell<Vec<GenerationRequest>>>,
    }

    impl GenerationClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        fn generate(&self, request: &GenerationRequest) -> Result<EncodedImage, GenerationError> {
            self.calls.borrow_mut().push(request.clone());
            self.script
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err(GenerationError::NoImage))
        }
    }

    struct FixedSource(Option<Result<EncodedImage, ()>>);

    impl ImageSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        fn acquire(&mut self) -> Result<Option<EncodedImage>, AcquisitionError> {
            match self.0.take() {
                Some(Ok(image)) => Ok(Some(image)),
                Some(Err(())) => Err(AcquisitionError::PermissionDenied("denied".to_string())),
                None => Ok(None),
            }
        }
    }

    fn image(tag: &str) -> EncodedImage {
        EncodedImage::from_bytes("image/png", tag.as_bytes()).unwrap()
    }

    fn nightwatcher() -> HeroDetails {
        HeroDetails::new(Gender::Female, "Nightwatcher", "Cyberpunk")
    }

    fn engine_with(
        outcomes: Vec<Result<EncodedImage, GenerationError>>,
        events: Option<std::path::PathBuf>,
    ) -> anyhow::Result<(HeroEngine, Rc<RefCell<Vec<GenerationRequest>>>)> {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let client = ScriptedClient {
            script: Rc::new(RefCell::new(outcomes.into_iter().collect())),
            calls: calls.clone(),
        };
        Ok((HeroEngine::new(Box::new(client), events)?, calls))
    }

    fn engine_in_details(
        outcomes: Vec<Result<EncodedImage, GenerationError>>,
    ) -> anyhow::Result<(HeroEngine, Rc<RefCell<Vec<GenerationRequest>>>)> {
        let (mut engine, calls) = engine_with(outcomes, None)?;
        assert!(engine.acquire(&mut FixedSource(Some(Ok(image("A")))))?);
        Ok((engine, calls))
    }

    #[test]
    fn successful_generation_shows_result() -> anyhow::Result<()> {
        let (mut engine, calls) = engine_in_details(vec![Ok(image("B"))])?;
        let step = engine.submit_details(nightwatcher())?;

        assert_eq!(step, Step::ShowResult);
        assert_eq!(engine.session().generated(), Some(&image("B")));
        assert_eq!(engine.session().image(), Some(&image("A")));
        assert_eq!(engine.session().details(), &nightwatcher());
        assert_eq!(calls.borrow().len(), 1);
        Ok(())
    }

    #[test]
    fn missing_image_part_returns_to_details_with_retry_message() -> anyhow::Result<()> {
        let (mut engine, _) = engine_in_details(vec![Err(GenerationError::NoImage)])?;
        let step = engine.submit_details(nightwatcher())?;

        assert_eq!(step, Step::CollectDetails);
        assert_eq!(engine.session().last_error(), Some(GENERATION_RETRY_MESSAGE));
        assert_eq!(engine.session().details().hero_name, "Nightwatcher");
        assert_eq!(engine.session().image(), Some(&image("A")));
        Ok(())
    }

    #[test]
    fn missing_credential_is_reported_verbatim() -> anyhow::Result<()> {
        let (mut engine, _) = engine_in_details(vec![Err(GenerationError::MissingCredential)])?;
        engine.submit_details(nightwatcher())?;
        let message = engine.session().last_error().unwrap_or_default();
        assert!(message.starts_with("API_KEY is not defined in the environment"));
        Ok(())
    }

    #[test]
    fn empty_alias_never_calls_client() -> anyhow::Result<()> {
        let (mut engine, calls) = engine_in_details(vec![Ok(image("B"))])?;
        let err = engine
            .submit_details(HeroDetails::new(Gender::Male, "", "Dark Noir"))
            .unwrap_err();
        assert_eq!(err, WizardError::EmptyAlias);
        assert!(calls.borrow().is_empty());
        assert_eq!(engine.step(), Step::CollectDetails);
        Ok(())
    }

    #[test]
    fn regenerate_resends_identical_request() -> anyhow::Result<()> {
        let (mut engine, calls) = engine_in_details(vec![Ok(image("B")), Ok(image("C"))])?;
        engine.submit_details(nightwatcher())?;
        assert_eq!(engine.regenerate()?, Step::ShowResult);

        let calls = calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
        assert_eq!(engine.session().generated(), Some(&image("C")));
        Ok(())
    }

    #[test]
    fn failed_regenerate_falls_back_to_details() -> anyhow::Result<()> {
        let (mut engine, _) =
            engine_in_details(vec![Ok(image("B")), Err(GenerationError::NoImage)])?;
        engine.submit_details(nightwatcher())?;
        assert_eq!(engine.regenerate()?, Step::CollectDetails);
        assert!(engine.session().generated().is_none());
        assert_eq!(engine.session().details(), &nightwatcher());
        Ok(())
    }

    #[test]
    fn acquisition_failure_keeps_acquire_step() -> anyhow::Result<()> {
        let (mut engine, _) = engine_with(Vec::new(), None)?;
        assert!(engine.acquire(&mut FixedSource(Some(Err(())))).is_err());
        assert_eq!(engine.step(), Step::AcquireImage);
        assert!(!engine.acquire(&mut FixedSource(None))?);
        assert_eq!(engine.step(), Step::AcquireImage);
        Ok(())
    }

    #[test]
    fn acquire_outside_first_step_is_rejected() -> anyhow::Result<()> {
        let (mut engine, _) = engine_in_details(Vec::new())?;
        assert!(matches!(
            engine.acquire(&mut FixedSource(Some(Ok(image("Z"))))),
            Err(AcquisitionError::Unsupported(_))
        ));
        assert_eq!(engine.session().image(), Some(&image("A")));
        Ok(())
    }

    #[test]
    fn reset_then_save_reports_nothing_to_save() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut engine, _) = engine_in_details(vec![Ok(image("B"))])?;
        engine.submit_details(nightwatcher())?;
        let saved = engine.save_poster(temp.path())?;
        assert_eq!(fs::read(saved)?, b"B".to_vec());

        engine.reset()?;
        assert_eq!(engine.step(), Step::AcquireImage);
        assert_eq!(engine.session().details(), &HeroDetails::default());
        assert!(engine.save_poster(temp.path()).is_err());
        Ok(())
    }

    #[test]
    fn events_record_the_session_flow() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let (mut engine, _) = engine_with(
            vec![Err(GenerationError::NoImage), Ok(image("B"))],
            Some(events_path.clone()),
        )?;
        engine.acquire(&mut FixedSource(Some(Ok(image("A")))))?;
        engine.submit_details(nightwatcher())?;
        engine.submit_details(nightwatcher())?;
        engine.reset()?;

        let raw = fs::read_to_string(&events_path)?;
        let rows: Vec<Value> = raw
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .collect();
        let types: Vec<&str> = rows
            .iter()
            .filter_map(|row| row.get("type").and_then(Value::as_str))
            .collect();
        assert_eq!(
            types,
            vec![
                "session_started",
                "image_acquired",
                "generation_started",
                "generation_failed",
                "generation_started",
                "generation_succeeded",
                "session_reset",
            ]
        );
        let session_id = engine.session().id();
        assert!(rows.iter().all(|row| row["session_id"] == Value::from(session_id)));
        assert_eq!(rows[2]["gender"], Value::from("Female"));
        assert_eq!(rows[3]["configuration"], Value::from(false));
        assert_eq!(rows[3]["error"], Value::from("no image generated"));
        assert_eq!(engine.event_log_path(), Some(events_path.as_path()));
        Ok(())
    }
}
