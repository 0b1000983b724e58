// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::{Status, StatusCode};

/// Lifecycle state embedded in every stream object.
///
/// Tracks whether the object is open and the first failure it observed. The
/// failure is sticky: once set it is preserved across every subsequent
/// operation until [`reset()`][Self::reset].
#[derive(Debug, Default)]
pub struct ObjectState {
    closed: bool,
    // First failure wins. Boxed so the healthy path stays one word wide.
    status: Option<Box<Status>>,
}

impl ObjectState {
    /// Creates the state of a freshly opened, healthy object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the state of an object that starts out closed.
    #[must_use]
    pub fn closed() -> Self {
        Self {
            closed: true,
            status: None,
        }
    }

    /// Whether the object has not been closed yet.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.closed
    }

    /// Whether the object is open and has not failed.
    #[must_use]
    pub fn ok(&self) -> bool {
        !self.closed && self.status.is_none()
    }

    /// The first failure, if any.
    #[must_use]
    pub fn status(&self) -> Option<&Status> {
        self.status.as_deref()
    }

    /// Stores `status` unless a failure is already recorded.
    ///
    /// Returns whether the status was stored.
    pub fn fail(&mut self, status: Status) -> bool {
        if self.status.is_some() {
            return false;
        }
        self.status = Some(Box::new(status));
        true
    }

    /// Marks the object closed. Idempotent.
    pub fn mark_closed(&mut self) {
        self.closed = true;
    }

    /// Returns the state to open and healthy, clearing any stored failure.
    pub fn reset(&mut self) {
        self.closed = false;
        self.status = None;
    }
}

/// Base capability of every reader and writer: open/closed state, sticky
/// failure status, and status annotation.
///
/// Implementors embed an [`ObjectState`] and expose it through
/// [`state()`][Self::state] / [`state_mut()`][Self::state_mut]; everything else
/// is provided. Per-type teardown goes in [`done()`][Self::done], which the
/// first [`close()`][Self::close] call runs exactly once.
pub trait Object {
    /// The embedded lifecycle state.
    fn state(&self) -> &ObjectState;

    /// The embedded lifecycle state, mutably.
    fn state_mut(&mut self) -> &mut ObjectState;

    /// Per-type teardown, run by the first [`close()`][Self::close] call.
    ///
    /// May discover additional failures and record them with
    /// [`fail()`][Self::fail]; the first recorded status wins.
    fn done(&mut self) {}

    /// Adds this object's own coordinates to a status about to be stored.
    ///
    /// The default adds nothing. Layers that track a position override this to
    /// prepend context such as `"at uncompressed byte N"`.
    #[must_use]
    fn annotate_status(&self, status: Status) -> Status {
        status
    }

    /// Whether the object has not been closed yet.
    fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Whether the object is open and has not failed.
    fn ok(&self) -> bool {
        self.state().ok()
    }

    /// The first failure recorded, if any.
    fn status(&self) -> Option<&Status> {
        self.state().status()
    }

    /// Records `status` as the failure of this object, annotated with this
    /// object's coordinates. Only the first failure is kept.
    ///
    /// Always returns `false` so failing call sites can `return self.fail(..)`.
    fn fail(&mut self, status: Status) -> bool {
        let annotated = self.annotate_status(status);
        self.state_mut().fail(annotated);
        false
    }

    /// Records `status` without applying this object's annotation.
    ///
    /// Used when the status already carries coordinates from the layer it came
    /// from and re-annotating would attach the wrong position.
    fn fail_without_annotation(&mut self, status: Status) -> bool {
        self.state_mut().fail(status);
        false
    }

    /// Records an [`StatusCode::OutOfRange`] failure for position overflow.
    fn fail_overflow(&mut self) -> bool {
        self.fail(Status::new(StatusCode::OutOfRange, "position overflow"))
    }

    /// Closes the object, running [`done()`][Self::done] on the first call.
    ///
    /// Returns whether no failure is recorded afterwards.
    fn close(&mut self) -> bool {
        if self.state().is_open() {
            self.done();
            self.state_mut().mark_closed();
        }
        self.state().status().is_none()
    }
}

impl<T: Object + ?Sized> Object for Box<T> {
    fn state(&self) -> &ObjectState {
        (**self).state()
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        (**self).state_mut()
    }

    fn done(&mut self) {
        (**self).done();
    }

    fn annotate_status(&self, status: Status) -> Status {
        (**self).annotate_status(status)
    }
}

impl<T: Object + ?Sized> Object for &mut T {
    fn state(&self) -> &ObjectState {
        (**self).state()
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        (**self).state_mut()
    }

    fn done(&mut self) {
        (**self).done();
    }

    fn annotate_status(&self, status: Status) -> Status {
        (**self).annotate_status(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        state: ObjectState,
        done_calls: usize,
    }

    impl Probe {
        fn new() -> Self {
            Self {
                state: ObjectState::new(),
                done_calls: 0,
            }
        }
    }

    impl Object for Probe {
        fn state(&self) -> &ObjectState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut ObjectState {
            &mut self.state
        }

        fn done(&mut self) {
            self.done_calls += 1;
        }

        fn annotate_status(&self, status: Status) -> Status {
            status.annotate("in probe")
        }
    }

    #[test]
    fn fresh_object_is_ok() {
        let probe = Probe::new();
        assert!(probe.is_open());
        assert!(probe.ok());
        assert!(probe.status().is_none());
    }

    #[test]
    fn first_failure_is_sticky() {
        let mut probe = Probe::new();
        assert!(!probe.fail(Status::data_loss("first")));
        assert!(!probe.fail(Status::internal("second")));
        assert!(!probe.ok());
        let status = probe.status().unwrap();
        assert_eq!(status.code(), StatusCode::DataLoss);
        assert_eq!(status.message(), "first");
    }

    #[test]
    fn fail_applies_annotation() {
        let mut probe = Probe::new();
        probe.fail(Status::invalid_argument("bad"));
        assert_eq!(probe.status().unwrap().to_string(), "bad; in probe");
    }

    #[test]
    fn fail_without_annotation_skips_it() {
        let mut probe = Probe::new();
        probe.fail_without_annotation(Status::invalid_argument("bad"));
        assert_eq!(probe.status().unwrap().to_string(), "bad");
    }

    #[test]
    fn close_runs_done_once() {
        let mut probe = Probe::new();
        assert!(probe.close());
        assert!(probe.close());
        assert_eq!(probe.done_calls, 1);
        assert!(!probe.is_open());
        assert!(!probe.ok());
    }

    #[test]
    fn close_reports_stored_failure() {
        let mut probe = Probe::new();
        probe.fail(Status::internal("broken"));
        assert!(!probe.close());
    }

    #[test]
    fn reset_reopens() {
        let mut probe = Probe::new();
        probe.fail(Status::internal("broken"));
        probe.close();
        probe.state_mut().reset();
        assert!(probe.ok());
    }
}
