mod completion;
mod dispatch;
mod timers;
