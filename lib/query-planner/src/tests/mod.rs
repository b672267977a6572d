mod collisions;
mod fragments;
mod requires;
mod testkit;
