use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use glam::{Quat, Vec3};
use tokio::sync::oneshot;

use roomsync::{
    AssetId, AssetSource, ClientMessage, EntityDescriptor, RemoteEntityId, ServerMessage,
};
use roomsync_client::{
    AssetLoader, BuildError, ConnectionError, EntityFactory, Host, JoinRequest, LoadFuture,
    LocalEntityHandle, Locator, MemoryRoom, MemoryTransport, PointerButtons, Relay, RoomConnection,
    Scene, SessionManager, SyncConfig, SyncError, memory_room,
};

#[derive(Default)]
struct World {
    next_handle: u64,
    built: Vec<(String, Option<String>)>,
    attached: Vec<(Option<LocalEntityHandle>, LocalEntityHandle)>,
    disposed: Vec<LocalEntityHandle>,
    visible: HashMap<LocalEntityHandle, bool>,
    positions: HashMap<LocalEntityHandle, Vec3>,
    rotations: HashMap<LocalEntityHandle, Quat>,
    viewpoint: Vec3,
    sounds: Vec<String>,
}

type Shared = Arc<Mutex<World>>;

struct Factory(Shared);

impl EntityFactory for Factory {
    fn build(
        &mut self,
        descriptor: &EntityDescriptor,
        assets: &roomsync_client::AssetGate,
    ) -> Result<LocalEntityHandle, BuildError> {
        if descriptor.entity_type == "portal" {
            return Err(BuildError::UnsupportedType(descriptor.entity_type.clone()));
        }
        let locator = descriptor
            .assets
            .first()
            .and_then(|asset| assets.locator(asset))
            .map(|locator| locator.as_str().to_owned());

        let mut world = self.0.lock().unwrap();
        world.next_handle += 1;
        world.built.push((descriptor.id.as_str().to_owned(), locator));
        Ok(LocalEntityHandle(world.next_handle))
    }
}

struct World3d(Shared);

impl Scene for World3d {
    fn attach(&mut self, parent: Option<LocalEntityHandle>, child: LocalEntityHandle) {
        self.0.lock().unwrap().attached.push((parent, child));
    }

    fn dispose(&mut self, handle: LocalEntityHandle) {
        self.0.lock().unwrap().disposed.push(handle);
    }

    fn set_visible(&mut self, handle: LocalEntityHandle, visible: bool) {
        self.0.lock().unwrap().visible.insert(handle, visible);
    }

    fn set_position(&mut self, handle: LocalEntityHandle, position: Vec3) {
        self.0.lock().unwrap().positions.insert(handle, position);
    }

    fn set_scale(&mut self, _handle: LocalEntityHandle, _scale: Vec3) {}

    fn set_color(&mut self, _handle: LocalEntityHandle, _color: &str) {}

    fn set_rotation(&mut self, handle: LocalEntityHandle, rotation: Quat) {
        self.0.lock().unwrap().rotations.insert(handle, rotation);
    }

    fn world_position(&self, handle: LocalEntityHandle) -> Option<Vec3> {
        Some(
            self.0
                .lock()
                .unwrap()
                .positions
                .get(&handle)
                .copied()
                .unwrap_or(Vec3::ZERO),
        )
    }

    fn viewpoint(&self) -> Vec3 {
        self.0.lock().unwrap().viewpoint
    }
}

struct Speaker(Shared);

impl Relay for Speaker {
    fn play_sound(&mut self, sound_id: &str) {
        self.0.lock().unwrap().sounds.push(sound_id.to_owned());
    }

    fn broadcast_chat(&mut self, _message: &str) {}
}

/// Loads finish only when the test says so.
#[derive(Clone, Default)]
struct ManualLoader {
    waiting: Arc<Mutex<HashMap<AssetId, oneshot::Sender<Result<Locator, String>>>>>,
}

impl ManualLoader {
    fn finish(&self, id: &str, result: Result<&str, &str>) -> bool {
        let sender = self.waiting.lock().unwrap().remove(&AssetId::from(id));
        let result = result
            .map(|location| Locator(location.to_owned()))
            .map_err(str::to_owned);
        sender.is_some_and(|sender| sender.send(result).is_ok())
    }
}

impl AssetLoader for ManualLoader {
    fn resolve(&self, id: &AssetId, _source: &AssetSource) -> LoadFuture {
        let (tx, rx) = oneshot::channel();
        self.waiting.lock().unwrap().insert(id.clone(), tx);
        Box::pin(async move {
            match rx.await {
                Ok(Ok(locator)) => Ok(locator),
                Ok(Err(reason)) => Err(anyhow::anyhow!(reason)),
                Err(_) => Err(anyhow::anyhow!("load abandoned")),
            }
        })
    }
}

struct Harness {
    manager: SessionManager<MemoryTransport>,
    room: MemoryRoom,
    world: Shared,
    loader: ManualLoader,
}

fn harness() -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();

    let world = Shared::default();
    let loader = ManualLoader::default();
    let host = Host::new(
        Factory(world.clone()),
        World3d(world.clone()),
        Speaker(world.clone()),
        loader.clone(),
    );
    let (transport, room) = memory_room();
    Harness {
        manager: SessionManager::new(transport, host, SyncConfig::default()),
        room,
        world,
        loader,
    }
}

impl Harness {
    async fn join(&mut self, name: &str) -> RoomConnection {
        self.manager
            .join(&JoinRequest::new("token", name).with_hub("lobby"))
            .await
            .unwrap();
        self.room.try_accept().unwrap()
    }
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

fn acks(connection: &mut RoomConnection) -> Vec<ClientMessage> {
    connection
        .drain()
        .into_iter()
        .filter(|message| !matches!(message, ClientMessage::UpdatePosition(_)))
        .collect()
}

fn id(value: &str) -> RemoteEntityId {
    RemoteEntityId::from(value)
}

fn register_model(asset: &str) -> ServerMessage {
    ServerMessage::RegisterModel {
        id: AssetId::from(asset),
        url: format!("https://cdn.example/{asset}.glb"),
    }
}

#[tokio::test(start_paused = true)]
async fn creation_waits_for_assets_then_acks_parent_first() {
    let mut h = harness();
    let mut room = h.join("Ada").await;

    room.push(&register_model("oak")).unwrap();
    room.push(&ServerMessage::CreateEntity(
        EntityDescriptor::new("e1", "Tree", "model")
            .with_asset("oak")
            .with_child(EntityDescriptor::new("e2", "Branch", "box")),
    ))
    .unwrap();

    advance(350).await;
    assert!(acks(&mut room).is_empty());
    let stats = h.manager.stats().await.unwrap();
    assert_eq!(stats.queued_creations, 1);
    assert_eq!(stats.pending_assets, 1);

    assert!(h.loader.finish("oak", Ok("cache/oak.glb")));
    advance(150).await;

    assert_eq!(
        acks(&mut room),
        vec![
            ClientMessage::EntityCreated { id: id("e1") },
            ClientMessage::EntityCreated { id: id("e2") },
        ]
    );
    let branch = h.manager.entity(&id("e2")).await.unwrap().unwrap();
    assert_eq!(branch.parent, Some(id("e1")));

    let world = h.world.lock().unwrap();
    assert_eq!(
        world.built,
        vec![
            ("e1".to_owned(), Some("cache/oak.glb".to_owned())),
            ("e2".to_owned(), None),
        ]
    );
    assert_eq!(
        world.attached,
        vec![
            (None, LocalEntityHandle(1)),
            (Some(LocalEntityHandle(1)), LocalEntityHandle(2)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_asset_drops_waiting_creation() {
    let mut h = harness();
    let mut room = h.join("Ada").await;

    room.push(&register_model("statue")).unwrap();
    room.push(&ServerMessage::CreateEntity(
        EntityDescriptor::new("s1", "Statue", "model").with_asset("statue"),
    ))
    .unwrap();
    advance(10).await;

    assert!(h.loader.finish("statue", Err("404 not found")));
    advance(500).await;

    assert!(acks(&mut room).is_empty());
    assert!(h.manager.entity(&id("s1")).await.unwrap().is_none());
    let stats = h.manager.stats().await.unwrap();
    assert_eq!(stats.queued_creations, 0);
    assert_eq!(stats.pending_assets, 0);
    assert!(h.world.lock().unwrap().built.is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_load_does_not_expire_waiting_creations() {
    let mut h = harness();
    let mut room = h.join("Ada").await;

    room.push(&register_model("castle")).unwrap();
    room.push(&ServerMessage::CreateEntity(
        EntityDescriptor::new("k1", "Keep", "model").with_asset("castle"),
    ))
    .unwrap();
    room.push(&ServerMessage::CreateEntity(EntityDescriptor::new("b1", "Bench", "box")))
        .unwrap();
    room.push(&ServerMessage::CreateEntity(
        EntityDescriptor::new("s1", "Sign", "box").with_parent("gate"),
    ))
    .unwrap();

    advance(61_000).await;
    assert!(acks(&mut room).is_empty());
    assert_eq!(h.manager.stats().await.unwrap().queued_creations, 3);

    assert!(h.loader.finish("castle", Ok("cache/castle.glb")));
    advance(500).await;
    assert_eq!(
        acks(&mut room),
        vec![
            ClientMessage::EntityCreated { id: id("k1") },
            ClientMessage::EntityCreated { id: id("b1") },
        ]
    );
    assert_eq!(h.manager.stats().await.unwrap().queued_creations, 1);

    advance(61_000).await;
    assert!(acks(&mut room).is_empty());
    assert_eq!(h.manager.stats().await.unwrap().queued_creations, 0);
    assert!(h.manager.entity(&id("s1")).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn unsupported_type_fails_only_that_creation() {
    let mut h = harness();
    let mut room = h.join("Ada").await;

    room.push(&ServerMessage::CreateEntity(EntityDescriptor::new("p1", "Portal", "portal")))
        .unwrap();
    room.push(&ServerMessage::CreateEntity(EntityDescriptor::new("c1", "Crate", "box")))
        .unwrap();
    advance(250).await;

    assert_eq!(acks(&mut room), vec![ClientMessage::EntityCreated { id: id("c1") }]);
    assert!(h.manager.entity(&id("p1")).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn delete_of_unknown_entity_is_dropped() {
    let mut h = harness();
    let mut room = h.join("Ada").await;

    room.push(&ServerMessage::CreateEntity(EntityDescriptor::new("e1", "Cube", "box")))
        .unwrap();
    advance(150).await;
    acks(&mut room);

    room.push(&ServerMessage::DeleteEntity { id: id("nope") }).unwrap();
    advance(10).await;

    assert!(acks(&mut room).is_empty());
    assert_eq!(h.manager.stats().await.unwrap().entities, 1);

    room.push(&ServerMessage::DeleteEntity { id: id("e1") }).unwrap();
    advance(10).await;
    assert_eq!(acks(&mut room), vec![ClientMessage::EntityDestroyed { id: id("e1") }]);
    assert_eq!(h.world.lock().unwrap().disposed, vec![LocalEntityHandle(1)]);
}

#[tokio::test(start_paused = true)]
async fn hover_and_click_are_reported() {
    let mut h = harness();
    let mut room = h.join("Ada").await;

    for name in ["a", "b"] {
        room.push(&ServerMessage::CreateEntity(EntityDescriptor::new(name, name, "box")))
            .unwrap();
    }
    advance(250).await;
    acks(&mut room);
    let a = h.manager.entity(&id("a")).await.unwrap().unwrap().local_handle;
    let b = h.manager.entity(&id("b")).await.unwrap().unwrap().local_handle;

    for target in [Some(a), Some(a), Some(b), None] {
        h.manager.update_hover(target).unwrap();
    }
    advance(1).await;
    assert_eq!(
        acks(&mut room),
        vec![
            ClientMessage::HoverEntered { id: id("a") },
            ClientMessage::HoverExit { id: id("a") },
            ClientMessage::HoverEntered { id: id("b") },
            ClientMessage::HoverExit { id: id("b") },
        ]
    );

    h.manager.update_hover(Some(a)).unwrap();
    h.manager.report_click(PointerButtons::LEFT).unwrap();
    advance(100).await;
    h.manager.update_hover(Some(a)).unwrap();
    h.manager.report_click(PointerButtons::LEFT).unwrap();
    advance(600).await;
    h.manager
        .report_click(PointerButtons::LEFT | PointerButtons::RIGHT)
        .unwrap();
    advance(1).await;

    let clicks: Vec<ClientMessage> = acks(&mut room)
        .into_iter()
        .filter(|message| matches!(message, ClientMessage::Clicked { .. }))
        .collect();
    assert_eq!(
        clicks,
        vec![
            ClientMessage::Clicked {
                id: id("a"),
                is_left: true,
                is_right: false,
            },
            ClientMessage::Clicked {
                id: id("a"),
                is_left: true,
                is_right: true,
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn heartbeat_sends_position_changes_only() {
    let mut h = harness();
    let mut room = h.join("Ada").await;

    advance(350).await;
    h.world.lock().unwrap().viewpoint = Vec3::new(2.0, 1.5, -4.0);
    advance(300).await;

    let positions: Vec<ClientMessage> = room
        .drain()
        .into_iter()
        .filter(|message| matches!(message, ClientMessage::UpdatePosition(_)))
        .collect();
    assert_eq!(
        positions,
        vec![
            ClientMessage::UpdatePosition(Vec3::ZERO.into()),
            ClientMessage::UpdatePosition(Vec3::new(2.0, 1.5, -4.0).into()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn look_at_turns_entity_toward_viewpoint() {
    let mut h = harness();
    let mut room = h.join("Ada").await;
    h.world.lock().unwrap().viewpoint = Vec3::new(10.0, 0.0, 0.0);

    room.push(&ServerMessage::CreateEntity(EntityDescriptor::new("bust", "Bust", "box")))
        .unwrap();
    advance(150).await;
    room.push(&ServerMessage::LookAt { id: id("bust") }).unwrap();
    advance(50).await;

    let rotation = h.world.lock().unwrap().rotations[&LocalEntityHandle(1)];
    assert!((rotation * Vec3::Z).abs_diff_eq(Vec3::X, 1e-5));
    assert_eq!(h.manager.stats().await.unwrap().look_at_bindings, 1);

    room.push(&ServerMessage::DeleteEntity { id: id("bust") }).unwrap();
    advance(50).await;
    assert_eq!(h.manager.stats().await.unwrap().look_at_bindings, 0);
}

#[tokio::test(start_paused = true)]
async fn rejoin_tears_down_previous_session() {
    let mut h = harness();
    let mut first = h.join("Ada").await;

    first.push(&register_model("lamp")).unwrap();
    first
        .push(&ServerMessage::CreateEntity(
            EntityDescriptor::new("p", "Desk", "box")
                .with_child(EntityDescriptor::new("c", "Drawer", "box")),
        ))
        .unwrap();
    first
        .push(&ServerMessage::CreateEntity(
            EntityDescriptor::new("lamp", "Lamp", "model").with_asset("lamp"),
        ))
        .unwrap();
    advance(150).await;
    assert_eq!(h.manager.stats().await.unwrap().entities, 0);
    assert!(h.loader.finish("lamp", Ok("lamp.glb")));
    advance(250).await;
    assert_eq!(h.manager.stats().await.unwrap().entities, 3);
    first.drain();

    let second = h.join("Ada").await;
    assert_eq!(h.manager.generation(), 2);
    assert!(first.is_closed());

    {
        let world = h.world.lock().unwrap();
        assert_eq!(world.disposed.len(), 3);
        let child = world.disposed.iter().position(|&d| d == LocalEntityHandle(2));
        let parent = world.disposed.iter().position(|&d| d == LocalEntityHandle(1));
        assert!(child < parent);
    }

    advance(1000).await;
    assert!(first.drain().is_empty());
    let stats = h.manager.stats().await.unwrap();
    assert_eq!(stats.generation, 2);
    assert_eq!(stats.entities, 0);
    assert_eq!(stats.pending_assets, 0);
    drop(second);
}

#[tokio::test(start_paused = true)]
async fn rejoin_abandons_in_flight_loads() {
    let mut h = harness();
    let first = h.join("Ada").await;
    first.push(&register_model("rock")).unwrap();
    advance(10).await;
    assert_eq!(h.manager.stats().await.unwrap().pending_assets, 1);

    let _second = h.join("Ada").await;
    advance(1).await;

    assert!(!h.loader.finish("rock", Ok("rock.glb")));
    assert!(h.manager.assets_ready().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn assets_ready_waits_for_pending_loads() {
    let mut h = harness();
    let room = h.join("Ada").await;
    room.push(&register_model("bell")).unwrap();
    advance(10).await;

    let loader = h.loader.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        loader.finish("bell", Ok("bell.glb"));
    });

    let started = tokio::time::Instant::now();
    assert!(h.manager.assets_ready().await.unwrap());
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn refused_join_keeps_host_for_retry() {
    let mut h = harness();
    h.room.refuse(Some("room is full"));

    let refused = h.manager.join(&JoinRequest::new("token", "Ada")).await;
    assert!(matches!(
        refused,
        Err(SyncError::Connection(ConnectionError::Rejected(_)))
    ));
    assert!(!h.manager.is_joined());
    assert!(matches!(h.manager.stats().await, Err(SyncError::NotJoined)));

    h.room.refuse(None);
    let mut room = h.join("Ada").await;
    room.push(&ServerMessage::PlaySound {
        sound_id: "chime".to_owned(),
    })
    .unwrap();
    advance(10).await;
    assert_eq!(h.world.lock().unwrap().sounds, vec!["chime".to_owned()]);
    assert_eq!(room.request.hub_id.as_deref(), Some("lobby"));
}

#[tokio::test(start_paused = true)]
async fn leave_returns_to_idle() {
    let mut h = harness();
    let room = h.join("Ada").await;
    room.push(&ServerMessage::CreateEntity(EntityDescriptor::new("e1", "Cube", "box")))
        .unwrap();
    advance(150).await;

    assert!(h.manager.leave().await);
    assert!(!h.manager.leave().await);
    assert!(!h.manager.is_joined());
    assert_eq!(h.world.lock().unwrap().disposed, vec![LocalEntityHandle(1)]);
    assert!(matches!(
        h.manager.update_hover(None),
        Err(SyncError::NotJoined)
    ));
}

#[tokio::test(start_paused = true)]
async fn modify_applies_hide_and_move() {
    let mut h = harness();
    let room = h.join("Ada").await;
    room.push(&ServerMessage::CreateEntity(EntityDescriptor::new("door", "Door", "box")))
        .unwrap();
    advance(150).await;

    let mut modification = roomsync::EntityModification::new("door");
    modification.visible = Some(false);
    modification.position = Some(roomsync::Vector3::new(0.0, 0.0, -3.0));
    room.push(&ServerMessage::ModifyEntity(modification)).unwrap();
    advance(10).await;

    let world = h.world.lock().unwrap();
    assert_eq!(world.visible.get(&LocalEntityHandle(1)), Some(&false));
    assert_eq!(
        world.positions.get(&LocalEntityHandle(1)),
        Some(&Vec3::new(0.0, 0.0, -3.0))
    );
}
