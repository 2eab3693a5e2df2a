pub mod map {
    use crate::hash::BuildHasher;

    pub type HashMap<K, V> = hashbrown::HashMap<K, V, BuildHasher>;
    pub type IndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasher>;
}
