/*!
Example code and documentation

# Basic usage

[`Storage<T>`] hands out strong pointers ([`Ptr`]) instead of references:

```
use slot_storage::Storage;

let mut xs = Storage::<usize>::new();

// Storage returns a strong pointer on insertion:
let x0 = xs.insert(0)?;

// Retrieve the item with the pointer:
assert_eq!(*xs.get(&x0), 0);
*xs.get_mut(&x0) += 10;
assert_eq!(xs[&x0], 10);

// Keep a weak pointer around, then give the strong claim back:
let weak = x0.weak();
xs.free(x0);

// Nothing is recycled until `sync`:
assert!(xs.exists(&weak));
assert_eq!(xs.sync(), 1);
assert!(!xs.exists(&weak));

// The slot is reused, but with a new generation, so the old pointer stays dead:
let x1 = xs.insert(20)?;
assert_eq!(x1.slot(), weak.slot());
assert_eq!(x1.gen(), weak.gen() + 1);
assert!(xs.upgrade(weak)?.is_none());

xs.free(x1);
xs.sync();
# Ok::<(), slot_storage::AllocError>(())
```

# Entities with components

Each component type gets its own storage; an entity owns one strong pointer per component.
A system walks the storages, and despawning gives the pointers back:

```
use slot_storage::{AllocError, Ptr, Storage};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    x: i32,
    y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Velocity {
    dx: i32,
    dy: i32,
}

pub struct Entity {
    pos: Ptr<Position>,
    vel: Ptr<Velocity>,
}

#[derive(Default)]
pub struct World {
    positions: Storage<Position>,
    velocities: Storage<Velocity>,
}

impl World {
    pub fn spawn(&mut self, pos: Position, vel: Velocity) -> Result<Entity, AllocError> {
        Ok(Entity {
            pos: self.positions.insert(pos)?,
            vel: self.velocities.insert(vel)?,
        })
    }

    pub fn step(&mut self, entities: &[Entity]) {
        for e in entities {
            let vel = *self.velocities.get(&e.vel);
            let pos = self.positions.get_mut(&e.pos);
            pos.x += vel.dx;
            pos.y += vel.dy;
        }
    }

    pub fn despawn(&mut self, e: Entity) {
        self.positions.free(e.pos);
        self.velocities.free(e.vel);
    }

    /// Recycles the components of despawned entities.
    pub fn maintain(&mut self) {
        self.positions.sync();
        self.velocities.sync();
    }
}

let mut world = World::default();
let a = world.spawn(Position { x: 5, y: 7 }, Velocity { dx: 1, dy: 0 })?;
let b = world.spawn(Position { x: 0, y: 0 }, Velocity { dx: 0, dy: -1 })?;

let mut entities = vec![a, b];
world.step(&entities);
assert_eq!(world.positions[&entities[0].pos], Position { x: 6, y: 7 });
assert_eq!(world.positions[&entities[1].pos], Position { x: 0, y: -1 });

let b = entities.pop().unwrap();
world.despawn(b);
world.maintain();

let positions = world.positions.iter().copied().collect::<Vec<_>>();
assert_eq!(positions, vec![Position { x: 6, y: 7 }]);

for e in entities {
    world.despawn(e);
}
world.maintain();
assert!(world.positions.is_empty());
assert!(world.velocities.is_empty());
# Ok::<(), AllocError>(())
```

# Sharing and observing

[`Storage::clone_ptr`] makes another claim; the item lives until every claim is given back and
synced. A [`WeakPtr`] observes without keeping the item alive:

```
use slot_storage::Storage;

let mut names = Storage::<String>::new();
let owner = names.insert("tree".to_string())?;
let shared = names.clone_ptr(&owner)?;
let observer = names.downgrade(owner);

names.sync();
assert_eq!(names.strong_count(&shared), 1);
assert_eq!(names[observer], "tree");

names.free(shared);
names.sync();
assert!(names.try_get(&observer).is_none());
# Ok::<(), slot_storage::AllocError>(())
```
*/

// for linking types in the docstring:
#[allow(unused)]
use super::*;
