mod helpers;
mod sync;
mod webhooks;
