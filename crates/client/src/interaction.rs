use std::collections::HashMap;
use std::time::Duration;

use bitflags::bitflags;
use glam::Vec3;
use tokio::time::Instant;

use roomsync::{ClientMessage, RemoteEntityId};

use crate::host::LocalEntityHandle;
use crate::registry::EntityRegistry;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PointerButtons: u8 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
    }
}

#[derive(Debug, Default)]
pub struct HoverState {
    pub current: Option<LocalEntityHandle>,
    pub last_click_by_target: HashMap<LocalEntityHandle, Instant>,
}

/// Turns local pointer and avatar state into outbound interaction reports.
#[derive(Debug)]
pub struct InteractionReporter {
    hover: HoverState,
    click_debounce: Duration,
    last_position: Option<Vec3>,
}

impl InteractionReporter {
    pub fn new(click_debounce: Duration) -> Self {
        Self {
            hover: HoverState::default(),
            click_debounce,
            last_position: None,
        }
    }

    pub fn hovered(&self) -> Option<LocalEntityHandle> {
        self.hover.current
    }

    pub fn update_hover(
        &mut self,
        target: Option<LocalEntityHandle>,
        registry: &EntityRegistry,
    ) -> Vec<ClientMessage> {
        if target == self.hover.current {
            return Vec::new();
        }

        let mut messages = Vec::with_capacity(2);
        if let Some(previous) = self.hover.current.take() {
            if let Some(id) = resolve(previous, registry) {
                messages.push(ClientMessage::HoverExit { id });
            }
        }
        if let Some(next) = target {
            if let Some(id) = resolve(next, registry) {
                messages.push(ClientMessage::HoverEntered { id });
            }
        }
        self.hover.current = target;
        messages
    }

    pub fn report_click(
        &mut self,
        buttons: PointerButtons,
        now: Instant,
        registry: &EntityRegistry,
    ) -> Option<ClientMessage> {
        let target = self.hover.current?;
        if buttons.is_empty() {
            return None;
        }

        if let Some(last) = self.hover.last_click_by_target.get(&target) {
            if now.saturating_duration_since(*last) <= self.click_debounce {
                log::debug!("click on {target} suppressed by debounce");
                return None;
            }
        }

        self.prune_clicks(now);
        self.hover.last_click_by_target.insert(target, now);
        self.hover.current = None;
        let id = resolve(target, registry)?;

        Some(ClientMessage::Clicked {
            id,
            is_left: buttons.contains(PointerButtons::LEFT),
            is_right: buttons.contains(PointerButtons::RIGHT),
        })
    }

    pub fn report_position(&mut self, position: Vec3) -> Option<ClientMessage> {
        if self.last_position == Some(position) {
            return None;
        }
        self.last_position = Some(position);
        Some(ClientMessage::UpdatePosition(position.into()))
    }

    pub fn forget(&mut self, handle: LocalEntityHandle) {
        if self.hover.current == Some(handle) {
            self.hover.current = None;
        }
        self.hover.last_click_by_target.remove(&handle);
    }

    fn prune_clicks(&mut self, now: Instant) {
        let window = self.click_debounce;
        self.hover
            .last_click_by_target
            .retain(|_, last| now.saturating_duration_since(*last) <= window);
    }
}

fn resolve(handle: LocalEntityHandle, registry: &EntityRegistry) -> Option<RemoteEntityId> {
    match registry.lookup_by_local(handle) {
        Some(entity) => Some(entity.remote_id.clone()),
        None => {
            log::warn!("interaction target {handle} is not a mirrored entity");
            None
        }
    }
}
