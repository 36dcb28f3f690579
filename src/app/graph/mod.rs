mod interaction;
mod sync;
mod view;
