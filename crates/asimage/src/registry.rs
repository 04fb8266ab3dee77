//! Reference counted storage for named images.

use std::collections::HashMap;

use crate::image::AsImage;

/// Refers to an image stored in an [`ImageManager`].
///
/// Handles stay unique: once an image is destroyed, its handle never refers to another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Entry {
    image: AsImage,
    name: Option<String>,
    ref_count: usize,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// One line of the registry printout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredImage {
    pub name: String,
    pub handle: ImageHandle,
    pub width: usize,
    pub height: usize,
    pub ref_count: usize,
}

/// Images shared between their users, looked up by name.
///
/// Every holder of a handle owns one count on it. The image is destroyed when the last count is
/// released.
#[derive(Debug)]
pub struct ImageManager {
    slots: Vec<Slot>,
    free: Vec<u32>,
    names: HashMap<String, ImageHandle>,
    gamma: f64,
    len: usize,
}

impl Default for ImageManager {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl ImageManager {
    pub fn new(gamma: f64) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            names: HashMap::new(),
            gamma,
            len: 0,
        }
    }

    /// Gamma applied to images loaded for this registry.
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn entry(&self, handle: ImageHandle) -> Option<&Entry> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn entry_mut(&mut self, handle: ImageHandle) -> Option<&mut Entry> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    /// Stores `image` under `name` with a count of one.
    ///
    /// Returns `None` when the name is taken.
    pub fn store(&mut self, image: AsImage, name: &str) -> Option<ImageHandle> {
        if self.names.contains_key(name) {
            debug!(name, "Image name already registered");
            return None;
        }

        let entry = Entry {
            image,
            name: Some(name.to_owned()),
            ref_count: 1,
        };

        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                ImageHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = u32::try_from(self.slots.len()).ok()?;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                ImageHandle { index, generation: 0 }
            }
        };

        self.names.insert(name.to_owned(), handle);
        self.len += 1;
        trace!(name, ?handle, "Stored image");

        Some(handle)
    }

    /// Looks `name` up without taking a count.
    pub fn query(&self, name: &str) -> Option<ImageHandle> {
        self.names.get(name).copied()
    }

    /// Looks `name` up and takes a count on it.
    pub fn fetch(&mut self, name: &str) -> Option<ImageHandle> {
        let handle = self.query(name)?;
        self.dup(handle)
    }

    pub fn get(&self, handle: ImageHandle) -> Option<&AsImage> {
        self.entry(handle).map(|entry| &entry.image)
    }

    pub fn get_mut(&mut self, handle: ImageHandle) -> Option<&mut AsImage> {
        self.entry_mut(handle).map(|entry| &mut entry.image)
    }

    pub fn ref_count(&self, handle: ImageHandle) -> Option<usize> {
        self.entry(handle).map(|entry| entry.ref_count)
    }

    pub fn name(&self, handle: ImageHandle) -> Option<&str> {
        self.entry(handle).and_then(|entry| entry.name.as_deref())
    }

    /// Takes another count on `handle`.
    pub fn dup(&mut self, handle: ImageHandle) -> Option<ImageHandle> {
        let entry = self.entry_mut(handle)?;
        entry.ref_count += 1;
        Some(handle)
    }

    /// Gives back one count, destroying the image with the last one.
    ///
    /// Returns the remaining count, `None` when the image was destroyed or the handle is stale.
    pub fn release(&mut self, handle: ImageHandle) -> Option<usize> {
        let entry = self.entry_mut(handle)?;
        entry.ref_count = entry.ref_count.saturating_sub(1);
        if entry.ref_count > 0 {
            return Some(entry.ref_count);
        }

        let slot = &mut self.slots[handle.index as usize];
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;

        if let Some(name) = entry.name {
            self.names.remove(&name);
            debug!(name, "Destroyed image");
        }

        None
    }

    /// Removes the name of `handle`, leaving the image and its counts alone.
    pub fn forget(&mut self, handle: ImageHandle) -> bool {
        let Some(entry) = self.entry_mut(handle) else {
            return false;
        };

        match entry.name.take() {
            Some(name) => {
                self.names.remove(&name);
                true
            }
            None => false,
        }
    }

    pub fn forget_name(&mut self, name: &str) -> bool {
        match self.query(name) {
            Some(handle) => self.forget(handle),
            None => false,
        }
    }

    pub fn release_by_name(&mut self, name: &str) -> Option<usize> {
        let handle = self.query(name)?;
        self.release(handle)
    }

    /// Lists named images sorted by name, logging each one.
    pub fn names(&self) -> Vec<RegisteredImage> {
        let mut registered: Vec<RegisteredImage> = self
            .names
            .iter()
            .filter_map(|(name, handle)| {
                let entry = self.entry(*handle)?;
                Some(RegisteredImage {
                    name: name.clone(),
                    handle: *handle,
                    width: entry.image.width(),
                    height: entry.image.height(),
                    ref_count: entry.ref_count,
                })
            })
            .collect();
        registered.sort_by(|a, b| a.name.cmp(&b.name));

        for image in &registered {
            debug!(
                name = %image.name,
                width = image.width,
                height = image.height,
                ref_count = image.ref_count,
                "Registered image"
            );
        }

        registered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> AsImage {
        AsImage::new(2, 3, 100).unwrap()
    }

    #[test]
    fn names_are_unique() {
        let mut manager = ImageManager::default();
        let handle = manager.store(image(), "back").unwrap();

        assert_eq!(manager.store(image(), "back"), None);
        assert_eq!(manager.query("back"), Some(handle));
        assert_eq!(manager.ref_count(handle), Some(1));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn counts_and_destruction() {
        let mut manager = ImageManager::new(2.2);
        let handle = manager.store(image(), "tile").unwrap();

        assert_eq!(manager.fetch("tile"), Some(handle));
        assert_eq!(manager.dup(handle), Some(handle));
        assert_eq!(manager.ref_count(handle), Some(3));

        assert_eq!(manager.release(handle), Some(2));
        assert_eq!(manager.release_by_name("tile"), Some(1));
        assert_eq!(manager.release(handle), None);

        assert!(manager.is_empty());
        assert_eq!(manager.query("tile"), None);
        assert!(manager.get(handle).is_none());
        assert_eq!(manager.release(handle), None);
    }

    #[test]
    fn stale_handles_stay_stale() {
        let mut manager = ImageManager::default();
        let old = manager.store(image(), "a").unwrap();
        manager.release(old);

        let new = manager.store(image(), "b").unwrap();
        assert_ne!(old, new);
        assert!(manager.get(old).is_none());
        assert!(manager.get(new).is_some());
    }

    #[test]
    fn forgotten_images_stay_alive() {
        let mut manager = ImageManager::default();
        let handle = manager.store(image(), "menu").unwrap();

        assert!(manager.forget_name("menu"));
        assert!(!manager.forget(handle));
        assert_eq!(manager.query("menu"), None);
        assert_eq!(manager.get(handle).map(AsImage::height), Some(3));
        assert!(manager.names().is_empty());

        let again = manager.store(image(), "menu").unwrap();
        assert_ne!(again, handle);
        assert_eq!(manager.release(handle), None);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn printout_is_sorted() {
        let mut manager = ImageManager::default();
        manager.store(image(), "b");
        let a = manager.store(image(), "a").unwrap();
        manager.dup(a);

        let names: Vec<(String, usize)> = manager
            .names()
            .into_iter()
            .map(|image| (image.name, image.ref_count))
            .collect();
        assert_eq!(names, [("a".to_owned(), 2), ("b".to_owned(), 1)]);
    }
}
